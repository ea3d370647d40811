//! The lobby membership state machine.
//!
//! A [`Lobby`] owns its seats and nothing else: who is in, who hosts, who is
//! ready, and which lifecycle phase the lobby is in. Round mechanics (questions,
//! timers, scoring rules) live a layer up; they mutate scores through the
//! accessors here so the membership invariants stay in one place.
//!
//! # Invariants
//!
//! - Whenever `players` is non-empty, exactly one player has `is_host = true`
//!   and `host()` names that player.
//! - `players` preserves join order; host succession follows it.
//! - Scores never go below zero (they are unsigned and only the owner
//!   mutates them).

use triviarena_protocol::{
    AccountId, ConnectionId, LobbyId, LobbySnapshot, LobbyStatus, LobbySummary,
    RankEntry,
};

use crate::{LobbyError, Player};

/// Default seat limit when a creator does not ask for one.
pub const DEFAULT_MAX_PLAYERS: usize = 4;

/// Hard bounds on the seat limit a creator may request.
pub const MIN_MAX_PLAYERS: usize = 2;
pub const MAX_MAX_PLAYERS: usize = 8;

/// Resolves a requested seat limit against the allowed bounds.
pub fn clamp_max_players(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_MAX_PLAYERS)
        .clamp(MIN_MAX_PLAYERS, MAX_MAX_PLAYERS)
}

/// What happened when a player was removed.
///
/// The caller (the game session) needs all three facts to react: the departed
/// seat for notifications, whether the host moved, and whether the lobby is
/// now an empty shell to tear down.
#[derive(Debug)]
pub struct Departure {
    /// The seat that was vacated.
    pub player: Player,
    /// Set when host ownership transferred to another seat.
    pub new_host: Option<ConnectionId>,
    /// The lobby has no seats left and should be destroyed.
    pub now_empty: bool,
}

/// A lobby: bounded membership, one host, a lifecycle status.
#[derive(Debug, Clone)]
pub struct Lobby {
    id: LobbyId,
    host: ConnectionId,
    players: Vec<Player>,
    max_players: usize,
    status: LobbyStatus,
    created_at: u64,
}

impl Lobby {
    /// Creates a lobby with its founding host seated.
    pub fn new(id: LobbyId, founder: Player, max_players: usize, created_at: u64) -> Self {
        let mut founder = founder;
        founder.is_host = true;
        founder.ready = true;
        Self {
            id,
            host: founder.connection_id,
            players: vec![founder],
            max_players,
            status: LobbyStatus::Waiting,
            created_at,
        }
    }

    pub fn id(&self) -> &LobbyId {
        &self.id
    }

    pub fn host(&self) -> ConnectionId {
        self.host
    }

    /// Display name of the current host; empty only for an empty lobby.
    pub fn host_name(&self) -> &str {
        self.players
            .iter()
            .find(|p| p.connection_id == self.host)
            .map(|p| p.name.as_str())
            .unwrap_or("")
    }

    pub fn status(&self) -> LobbyStatus {
        self.status
    }

    pub fn set_status(&mut self, status: LobbyStatus) {
        self.status = status;
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.players.iter().any(|p| p.connection_id == conn)
    }

    pub fn is_host_conn(&self, conn: ConnectionId) -> bool {
        self.host == conn
    }

    pub fn player(&self, conn: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.connection_id == conn)
    }

    pub fn player_mut(&mut self, conn: ConnectionId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.connection_id == conn)
    }

    /// Whether `account` already holds a seat here.
    pub fn has_account(&self, account: &AccountId) -> bool {
        self.players
            .iter()
            .any(|p| p.account.as_ref() == Some(account))
    }

    /// Every connection currently seated, in join order.
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.players.iter().map(|p| p.connection_id).collect()
    }

    // -----------------------------------------------------------------------
    // Membership mutations
    // -----------------------------------------------------------------------

    /// Seats a joining player.
    ///
    /// # Errors
    /// - [`LobbyError::Full`] when every seat is taken.
    /// - [`LobbyError::DuplicateIdentity`] when the joiner's account already
    ///   holds a seat (one seat per identity).
    pub fn add_player(&mut self, player: Player) -> Result<(), LobbyError> {
        if self.is_full() {
            return Err(LobbyError::Full);
        }
        if let Some(account) = &player.account {
            if self.has_account(account) {
                return Err(LobbyError::DuplicateIdentity);
            }
        }
        let mut player = player;
        player.is_host = false;
        self.players.push(player);
        Ok(())
    }

    /// Removes a seat and settles host succession.
    ///
    /// When the departing player was host, the earliest-joined remaining
    /// player inherits the role with `ready` forced on (hosts never block a
    /// ready check). Returns `None` if `conn` was not seated.
    pub fn remove_player(&mut self, conn: ConnectionId) -> Option<Departure> {
        let idx = self.players.iter().position(|p| p.connection_id == conn)?;
        let player = self.players.remove(idx);

        let mut new_host = None;
        if player.is_host {
            if let Some(next) = self.players.first_mut() {
                next.is_host = true;
                next.ready = true;
                self.host = next.connection_id;
                new_host = Some(next.connection_id);
            }
        }

        Some(Departure {
            player,
            new_host,
            now_empty: self.players.is_empty(),
        })
    }

    /// Repairs the host invariant after arbitrary mutation.
    ///
    /// If the recorded host no longer sits in the lobby, the first remaining
    /// player is promoted. Returns the promoted connection when a repair
    /// happened.
    pub fn ensure_host(&mut self) -> Option<ConnectionId> {
        if self.players.is_empty() || self.contains(self.host) {
            return None;
        }
        for p in &mut self.players {
            p.is_host = false;
        }
        let first = &mut self.players[0];
        first.is_host = true;
        first.ready = true;
        self.host = first.connection_id;
        Some(self.host)
    }

    // -----------------------------------------------------------------------
    // Ready flags
    // -----------------------------------------------------------------------

    /// Flips a player's ready flag.
    ///
    /// Returns the new value, or `None` when the lobby phase does not accept
    /// toggles (a silent no-op, not an error).
    pub fn toggle_ready(&mut self, conn: ConnectionId) -> Option<bool> {
        if !self.status.accepts_ready_toggle() {
            return None;
        }
        let player = self.player_mut(conn)?;
        player.ready = !player.ready;
        Some(player.ready)
    }

    /// Marks one player ready regardless of phase. Used for rematch
    /// confirmations.
    pub fn mark_ready(&mut self, conn: ConnectionId) -> bool {
        match self.player_mut(conn) {
            Some(p) => {
                p.ready = true;
                true
            }
            None => false,
        }
    }

    /// Waiting-room start rule: every guest ready, host exempt.
    pub fn can_start(&self) -> bool {
        self.players.iter().all(|p| p.ready || p.is_host)
    }

    /// Rematch rule: every player ready, host included.
    pub fn all_ready_strict(&self) -> bool {
        self.players.iter().all(|p| p.ready)
    }

    /// Clears every ready flag, host included. Runs at round end and when a
    /// rematch is proposed, so each confirmation is explicit.
    pub fn clear_ready_flags(&mut self) {
        for p in &mut self.players {
            p.ready = false;
        }
    }

    /// Restores waiting-room defaults: host ready, guests not.
    pub fn reset_ready_defaults(&mut self) {
        for p in &mut self.players {
            p.ready = p.is_host;
        }
    }

    /// Zeroes every score. Runs at round start and on return to the waiting
    /// room.
    pub fn reset_scores(&mut self) {
        for p in &mut self.players {
            p.score = 0;
        }
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Final standings: descending score, ties kept in join order.
    pub fn ranking(&self) -> Vec<RankEntry> {
        let mut order: Vec<&Player> = self.players.iter().collect();
        // Stable sort, so equal scores keep join order.
        order.sort_by(|a, b| b.score.cmp(&a.score));
        order
            .iter()
            .enumerate()
            .map(|(i, p)| RankEntry {
                name: p.name.clone(),
                score: p.score,
                rank: i + 1,
            })
            .collect()
    }

    /// One player's row of the ranking, found by connection rather than
    /// name so duplicate display names stay unambiguous.
    pub fn rank_of(&self, conn: ConnectionId) -> Option<RankEntry> {
        let mut order: Vec<&Player> = self.players.iter().collect();
        order.sort_by(|a, b| b.score.cmp(&a.score));
        order
            .iter()
            .position(|p| p.connection_id == conn)
            .map(|i| RankEntry {
                name: order[i].name.clone(),
                score: order[i].score,
                rank: i + 1,
            })
    }

    pub fn snapshot(&self) -> LobbySnapshot {
        LobbySnapshot {
            id: self.id.clone(),
            host: self.host,
            players: self.players.iter().map(Player::snapshot).collect(),
            max_players: self.max_players,
            status: self.status,
            created_at: self.created_at,
        }
    }

    pub fn summary(&self) -> LobbySummary {
        LobbySummary {
            id: self.id.clone(),
            host_name: self.host_name().to_owned(),
            player_count: self.players.len(),
            max_players: self.max_players,
            status: self.status,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn conn(id: u64) -> ConnectionId {
        ConnectionId(id)
    }

    /// A two-seat lobby with "ana" hosting.
    fn lobby_for_two() -> Lobby {
        Lobby::new(
            LobbyId::from("AB12CD"),
            Player::host(conn(1), "ana", None),
            2,
            0,
        )
    }

    /// A four-seat lobby with "ana" hosting and "bo"/"cy" joined.
    fn lobby_of_three() -> Lobby {
        let mut lobby = Lobby::new(
            LobbyId::from("AB12CD"),
            Player::host(conn(1), "ana", None),
            4,
            0,
        );
        lobby.add_player(Player::guest(conn(2), "bo", None)).unwrap();
        lobby.add_player(Player::guest(conn(3), "cy", None)).unwrap();
        lobby
    }

    fn assert_single_host(lobby: &Lobby) {
        let hosts: Vec<_> = lobby.players().iter().filter(|p| p.is_host).collect();
        assert_eq!(hosts.len(), 1, "exactly one host expected");
        assert_eq!(hosts[0].connection_id, lobby.host());
    }

    // =====================================================================
    // clamp_max_players()
    // =====================================================================

    #[test]
    fn test_clamp_max_players_defaults_to_four() {
        assert_eq!(clamp_max_players(None), 4);
    }

    #[test]
    fn test_clamp_max_players_enforces_bounds() {
        assert_eq!(clamp_max_players(Some(1)), 2);
        assert_eq!(clamp_max_players(Some(2)), 2);
        assert_eq!(clamp_max_players(Some(6)), 6);
        assert_eq!(clamp_max_players(Some(50)), 8);
    }

    // =====================================================================
    // new() / add_player()
    // =====================================================================

    #[test]
    fn test_new_lobby_founder_is_ready_host() {
        let lobby = lobby_for_two();
        assert_eq!(lobby.player_count(), 1);
        assert_eq!(lobby.host(), conn(1));
        assert_eq!(lobby.host_name(), "ana");
        assert!(lobby.players()[0].ready, "host ready defaults true");
        assert_eq!(lobby.status(), LobbyStatus::Waiting);
        assert_single_host(&lobby);
    }

    #[test]
    fn test_add_player_seats_guest_unready() {
        let mut lobby = lobby_for_two();
        lobby.add_player(Player::guest(conn(2), "bo", None)).unwrap();

        assert_eq!(lobby.player_count(), 2);
        let bo = lobby.player(conn(2)).unwrap();
        assert!(!bo.is_host);
        assert!(!bo.ready);
        assert_single_host(&lobby);
    }

    #[test]
    fn test_add_player_full_lobby_is_rejected() {
        let mut lobby = lobby_for_two();
        lobby.add_player(Player::guest(conn(2), "bo", None)).unwrap();

        let result = lobby.add_player(Player::guest(conn(3), "cy", None));

        assert_eq!(result, Err(LobbyError::Full));
        assert_eq!(lobby.player_count(), 2);
    }

    #[test]
    fn test_add_player_duplicate_account_is_rejected() {
        let mut lobby = Lobby::new(
            LobbyId::from("AB12CD"),
            Player::host(conn(1), "ana", Some(AccountId::from("acc-1"))),
            4,
            0,
        );

        let result = lobby.add_player(Player::guest(
            conn(2),
            "ana-again",
            Some(AccountId::from("acc-1")),
        ));

        assert_eq!(result, Err(LobbyError::DuplicateIdentity));
        assert_eq!(lobby.player_count(), 1);
    }

    #[test]
    fn test_add_player_anonymous_players_never_collide() {
        // Two players without accounts must both be seatable.
        let mut lobby = lobby_of_three();
        lobby.add_player(Player::guest(conn(4), "dee", None)).unwrap();
        assert_eq!(lobby.player_count(), 4);
    }

    // =====================================================================
    // remove_player() and host succession
    // =====================================================================

    #[test]
    fn test_remove_guest_keeps_host() {
        let mut lobby = lobby_of_three();

        let dep = lobby.remove_player(conn(2)).unwrap();

        assert_eq!(dep.player.name, "bo");
        assert!(dep.new_host.is_none());
        assert!(!dep.now_empty);
        assert_eq!(lobby.host(), conn(1));
        assert_single_host(&lobby);
    }

    #[test]
    fn test_remove_host_promotes_next_in_join_order() {
        let mut lobby = lobby_of_three();

        let dep = lobby.remove_player(conn(1)).unwrap();

        assert_eq!(dep.new_host, Some(conn(2)), "bo joined first after ana");
        assert_eq!(lobby.host(), conn(2));
        assert_single_host(&lobby);
    }

    #[test]
    fn test_promoted_host_is_forced_ready() {
        let mut lobby = lobby_of_three();
        assert!(!lobby.player(conn(2)).unwrap().ready);

        lobby.remove_player(conn(1)).unwrap();

        assert!(
            lobby.player(conn(2)).unwrap().ready,
            "new host must not block the ready check"
        );
    }

    #[test]
    fn test_remove_last_player_reports_empty() {
        let mut lobby = lobby_for_two();

        let dep = lobby.remove_player(conn(1)).unwrap();

        assert!(dep.now_empty);
        assert!(dep.new_host.is_none());
        assert!(lobby.is_empty());
    }

    #[test]
    fn test_remove_unknown_connection_returns_none() {
        let mut lobby = lobby_for_two();
        assert!(lobby.remove_player(conn(99)).is_none());
        assert_eq!(lobby.player_count(), 1);
    }

    #[test]
    fn test_ensure_host_repairs_missing_host() {
        let mut lobby = lobby_of_three();
        // Simulate a corrupted host record.
        lobby.host = conn(99);
        for p in &mut lobby.players {
            p.is_host = false;
        }

        let promoted = lobby.ensure_host();

        assert_eq!(promoted, Some(conn(1)));
        assert_single_host(&lobby);
    }

    #[test]
    fn test_ensure_host_no_op_when_host_seated() {
        let mut lobby = lobby_of_three();
        assert!(lobby.ensure_host().is_none());
        assert_eq!(lobby.host(), conn(1));
    }

    // =====================================================================
    // Ready rules
    // =====================================================================

    #[test]
    fn test_toggle_ready_flips_in_waiting() {
        let mut lobby = lobby_of_three();

        assert_eq!(lobby.toggle_ready(conn(2)), Some(true));
        assert_eq!(lobby.toggle_ready(conn(2)), Some(false));
    }

    #[test]
    fn test_toggle_ready_is_no_op_while_playing() {
        let mut lobby = lobby_of_three();
        lobby.set_status(LobbyStatus::Playing);

        assert_eq!(lobby.toggle_ready(conn(2)), None);
        assert!(!lobby.player(conn(2)).unwrap().ready);
    }

    #[test]
    fn test_toggle_ready_allowed_in_waiting_new_round() {
        let mut lobby = lobby_of_three();
        lobby.set_status(LobbyStatus::WaitingNewRound);

        assert_eq!(lobby.toggle_ready(conn(2)), Some(true));
    }

    #[test]
    fn test_can_start_exempts_host() {
        let mut lobby = lobby_of_three();
        assert!(!lobby.can_start(), "guests not ready yet");

        lobby.toggle_ready(conn(2));
        lobby.toggle_ready(conn(3));
        assert!(lobby.can_start());
    }

    #[test]
    fn test_can_start_single_host_lobby() {
        // A host alone trivially passes the waiting-room rule.
        let lobby = lobby_for_two();
        assert!(lobby.can_start());
    }

    #[test]
    fn test_all_ready_strict_includes_host() {
        let mut lobby = lobby_of_three();
        lobby.clear_ready_flags();
        lobby.mark_ready(conn(2));
        lobby.mark_ready(conn(3));

        assert!(!lobby.all_ready_strict(), "host has not confirmed");

        lobby.mark_ready(conn(1));
        assert!(lobby.all_ready_strict());
    }

    #[test]
    fn test_reset_ready_defaults_restores_host_exemption() {
        let mut lobby = lobby_of_three();
        lobby.clear_ready_flags();

        lobby.reset_ready_defaults();

        assert!(lobby.player(conn(1)).unwrap().ready);
        assert!(!lobby.player(conn(2)).unwrap().ready);
    }

    // =====================================================================
    // Scores and ranking
    // =====================================================================

    #[test]
    fn test_reset_scores_zeroes_everyone() {
        let mut lobby = lobby_of_three();
        lobby.player_mut(conn(1)).unwrap().score = 4000;
        lobby.player_mut(conn(2)).unwrap().score = 2500;

        lobby.reset_scores();

        assert!(lobby.players().iter().all(|p| p.score == 0));
    }

    #[test]
    fn test_ranking_descends_by_score() {
        let mut lobby = lobby_of_three();
        lobby.player_mut(conn(1)).unwrap().score = 2000;
        lobby.player_mut(conn(2)).unwrap().score = 9000;
        lobby.player_mut(conn(3)).unwrap().score = 500;

        let ranking = lobby.ranking();

        assert_eq!(ranking[0].name, "bo");
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[1].name, "ana");
        assert_eq!(ranking[2].name, "cy");
        assert_eq!(ranking[2].rank, 3);
    }

    #[test]
    fn test_ranking_ties_keep_join_order() {
        let mut lobby = lobby_of_three();
        lobby.player_mut(conn(1)).unwrap().score = 1000;
        lobby.player_mut(conn(2)).unwrap().score = 1000;
        lobby.player_mut(conn(3)).unwrap().score = 1000;

        let ranking = lobby.ranking();

        assert_eq!(ranking[0].name, "ana");
        assert_eq!(ranking[1].name, "bo");
        assert_eq!(ranking[2].name, "cy");
    }

    #[test]
    fn test_rank_of_finds_player_by_connection() {
        let mut lobby = lobby_of_three();
        lobby.player_mut(conn(1)).unwrap().score = 2000;
        lobby.player_mut(conn(2)).unwrap().score = 9000;
        lobby.player_mut(conn(3)).unwrap().score = 500;

        let entry = lobby.rank_of(conn(1)).unwrap();
        assert_eq!(entry.name, "ana");
        assert_eq!(entry.score, 2000);
        assert_eq!(entry.rank, 2);

        assert!(lobby.rank_of(conn(99)).is_none());
    }

    // =====================================================================
    // Views
    // =====================================================================

    #[test]
    fn test_snapshot_reflects_membership() {
        let lobby = lobby_of_three();
        let snap = lobby.snapshot();

        assert_eq!(snap.id, LobbyId::from("AB12CD"));
        assert_eq!(snap.host, conn(1));
        assert_eq!(snap.players.len(), 3);
        assert_eq!(snap.max_players, 4);
        assert_eq!(snap.status, LobbyStatus::Waiting);
    }

    #[test]
    fn test_summary_counts_players() {
        let lobby = lobby_of_three();
        let summary = lobby.summary();

        assert_eq!(summary.host_name, "ana");
        assert_eq!(summary.player_count, 3);
        assert_eq!(summary.max_players, 4);
    }
}
