//! The per-lobby game session actor.
//!
//! Each lobby runs as one spawned task owning all of its state: membership,
//! per-player power books, the question supply, and the single pending timer.
//! Everything reaches it through an mpsc command channel, so there is no
//! locking anywhere in the hot path and event ordering within a lobby is the
//! order commands arrived in.
//!
//! The timer is one `Option<GameTimer>` slot. Arming a new timer replaces
//! whatever was pending, and the actor takes the slot before acting on a
//! fired deadline, so a stale deadline can never advance the game twice.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use triviarena_lobby::{Lobby, Player};
use triviarena_powers::{PowerBook, PowerEffect};
use triviarena_protocol::{
    AccountId, ConnectionId, LobbyId, LobbyStatus, LobbySummary, PowerEffectView,
    PowerGrantView, QuestionView, Recipient, ServerEvent,
};
use triviarena_questions::{Question, QuestionSource, QuestionSupply};

use crate::config::GameConfig;
use crate::error::GameError;
use crate::ranking::RankingStore;
use crate::round::{score_for_latency, AnswerRecord, RoundState};

/// Command channel depth per lobby. Bounded so a flooding client applies
/// backpressure at its own connection rather than growing server memory.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Outbound event channel to one connection's socket writer.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// A gameplay request from a seated player, already past transport parsing.
#[derive(Debug)]
pub enum GameAction {
    ToggleReady,
    StartGame,
    SubmitAnswer { answer_index: usize },
    TimeUp,
    UsePower { power_type: String },
    RequestNewRound,
    ReadyForNewRound,
    BackToLobby,
    Chat { message: String },
}

/// Commands the registry sends into a lobby actor.
pub(crate) enum LobbyCommand {
    Join {
        conn: ConnectionId,
        name: String,
        account: Option<AccountId>,
        sender: EventSender,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Leave {
        conn: ConnectionId,
        /// Send the leaver a confirmation. False for silent disconnects.
        notify: bool,
        reply: oneshot::Sender<LeaveOutcome>,
    },
    Action {
        conn: ConnectionId,
        action: GameAction,
    },
    Summary {
        reply: oneshot::Sender<LobbySummary>,
    },
    Shutdown,
}

/// Identity of a player the actor just unseated, for registry index cleanup.
#[derive(Debug, Default)]
pub(crate) struct DepartedPlayer {
    pub name: String,
    pub account: Option<AccountId>,
}

/// What a leave did, reported back to the registry.
#[derive(Debug, Default)]
pub(crate) struct LeaveOutcome {
    /// `None` when the connection held no seat here.
    pub departed: Option<DepartedPlayer>,
    /// The lobby emptied and its actor is stopping.
    pub now_empty: bool,
}

impl LeaveOutcome {
    /// Reported when the actor is already gone, so the registry drops the
    /// stale handle instead of keeping a dead lobby registered.
    fn actor_gone() -> Self {
        Self { departed: None, now_empty: true }
    }
}

/// Cheap clonable handle to one lobby actor.
///
/// Every method maps a closed channel to [`GameError::LobbyNotFound`]: a
/// dead actor and a missing lobby are the same thing to callers.
#[derive(Debug, Clone)]
pub(crate) struct LobbyHandle {
    lobby_id: LobbyId,
    sender: mpsc::Sender<LobbyCommand>,
}

impl LobbyHandle {
    pub(crate) fn lobby_id(&self) -> &LobbyId {
        &self.lobby_id
    }

    pub(crate) async fn join(
        &self,
        conn: ConnectionId,
        name: String,
        account: Option<AccountId>,
        sender: EventSender,
    ) -> Result<(), GameError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(LobbyCommand::Join {
                conn,
                name,
                account,
                sender,
                reply,
            })
            .await
            .map_err(|_| GameError::LobbyNotFound)?;
        rx.await.map_err(|_| GameError::LobbyNotFound)?
    }

    pub(crate) async fn leave(&self, conn: ConnectionId, notify: bool) -> LeaveOutcome {
        let (reply, rx) = oneshot::channel();
        if self
            .sender
            .send(LobbyCommand::Leave { conn, notify, reply })
            .await
            .is_err()
        {
            return LeaveOutcome::actor_gone();
        }
        rx.await.unwrap_or_else(|_| LeaveOutcome::actor_gone())
    }

    pub(crate) async fn action(
        &self,
        conn: ConnectionId,
        action: GameAction,
    ) -> Result<(), GameError> {
        self.sender
            .send(LobbyCommand::Action { conn, action })
            .await
            .map_err(|_| GameError::LobbyNotFound)
    }

    pub(crate) async fn summary(&self) -> Option<LobbySummary> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(LobbyCommand::Summary { reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub(crate) async fn shutdown(&self) {
        let _ = self.sender.send(LobbyCommand::Shutdown).await;
    }
}

/// What to do when the pending deadline fires.
#[derive(Debug)]
enum TimerAction {
    /// Put the next question in front of the players.
    DeliverQuestion,
    /// The answer window closed with stragglers outstanding.
    QuestionTimeout,
    /// Finish the round, crowning `winner` if set.
    EndRound { winner: Option<ConnectionId> },
}

#[derive(Debug)]
struct GameTimer {
    fires_at: Instant,
    action: TimerAction,
}

/// Sleeps until the deadline, or forever when there is none. Pairing this
/// with `select!` keeps the actor single-threaded over commands and timers.
async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Creates the lobby with its founder seated and spawns the actor task.
pub(crate) fn spawn_lobby<S: QuestionSource, R: RankingStore>(
    lobby_id: LobbyId,
    founder: Player,
    founder_sender: EventSender,
    max_players: usize,
    config: GameConfig,
    source: Arc<S>,
    ranking: Arc<R>,
) -> LobbyHandle {
    let (sender, receiver) = mpsc::channel(COMMAND_CHANNEL_SIZE);

    let founder_conn = founder.connection_id;
    let lobby = Lobby::new(lobby_id.clone(), founder, max_players, now_epoch_ms());

    let mut senders = HashMap::new();
    senders.insert(founder_conn, founder_sender);
    let mut books = HashMap::new();
    books.insert(founder_conn, PowerBook::default());

    let actor = LobbyActor {
        lobby,
        config,
        senders,
        books,
        supply: None,
        staged: None,
        round: None,
        timer: None,
        questions_delivered: 0,
        receiver,
        source,
        ranking,
    };
    tokio::spawn(actor.run());

    LobbyHandle { lobby_id, sender }
}

struct LobbyActor<S: QuestionSource, R: RankingStore> {
    lobby: Lobby,
    config: GameConfig,
    /// Outbound channel per seated connection.
    senders: HashMap<ConnectionId, EventSender>,
    /// Per-player power state for the current score round.
    books: HashMap<ConnectionId, PowerBook>,
    /// Background question feed; `Some` only while a round is running.
    supply: Option<QuestionSupply<S>>,
    /// First question of the round, drawn eagerly at round start.
    staged: Option<Question>,
    /// The question currently in flight, if any.
    round: Option<RoundState>,
    timer: Option<GameTimer>,
    /// Questions delivered this round, also the next question's number.
    questions_delivered: u32,
    receiver: mpsc::Receiver<LobbyCommand>,
    source: Arc<S>,
    ranking: Arc<R>,
}

impl<S: QuestionSource, R: RankingStore> LobbyActor<S, R> {
    async fn run(mut self) {
        tracing::info!(lobby_id = %self.lobby.id(), "lobby actor started");
        self.dispatch(
            Recipient::All,
            ServerEvent::LobbyCreated {
                lobby: self.lobby.snapshot(),
            },
        );

        loop {
            let deadline = self.timer.as_ref().map(|t| t.fires_at);
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(LobbyCommand::Join { conn, name, account, sender, reply }) => {
                        let _ = reply.send(self.handle_join(conn, name, account, sender));
                    }
                    Some(LobbyCommand::Leave { conn, notify, reply }) => {
                        let outcome = self.handle_leave(conn, notify);
                        let stopping = outcome.now_empty;
                        let _ = reply.send(outcome);
                        if stopping {
                            break;
                        }
                    }
                    Some(LobbyCommand::Action { conn, action }) => {
                        if let Err(error) = self.handle_action(conn, action).await {
                            self.send_error(conn, &error);
                        }
                    }
                    Some(LobbyCommand::Summary { reply }) => {
                        let _ = reply.send(self.lobby.summary());
                    }
                    Some(LobbyCommand::Shutdown) => {
                        tracing::info!(lobby_id = %self.lobby.id(), "lobby shutting down");
                        self.dispatch(
                            Recipient::All,
                            ServerEvent::LobbyClosed {
                                lobby_id: self.lobby.id().clone(),
                            },
                        );
                        break;
                    }
                    None => break,
                },
                _ = wait_for_deadline(deadline) => {
                    self.handle_timer_fired().await;
                }
            }
        }

        if let Some(supply) = self.supply.take() {
            supply.stop();
        }
        tracing::info!(lobby_id = %self.lobby.id(), "lobby actor stopped");
    }

    async fn handle_action(
        &mut self,
        conn: ConnectionId,
        action: GameAction,
    ) -> Result<(), GameError> {
        match action {
            GameAction::ToggleReady => {
                self.handle_toggle_ready(conn);
                Ok(())
            }
            GameAction::StartGame => self.handle_start_game(conn).await,
            GameAction::SubmitAnswer { answer_index } => {
                self.handle_submit_answer(conn, answer_index)
            }
            GameAction::TimeUp => {
                self.handle_time_up(conn);
                Ok(())
            }
            GameAction::UsePower { power_type } => self.handle_use_power(conn, &power_type),
            GameAction::RequestNewRound => self.handle_request_new_round(conn),
            GameAction::ReadyForNewRound => {
                self.handle_ready_for_new_round(conn).await;
                Ok(())
            }
            GameAction::BackToLobby => self.handle_back_to_lobby(conn),
            GameAction::Chat { message } => self.handle_chat(conn, message),
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    fn handle_join(
        &mut self,
        conn: ConnectionId,
        name: String,
        account: Option<AccountId>,
        sender: EventSender,
    ) -> Result<(), GameError> {
        let player_name = name.clone();
        self.lobby.add_player(Player::guest(conn, name, account))?;
        self.senders.insert(conn, sender);
        self.books.insert(conn, PowerBook::default());

        tracing::info!(
            lobby_id = %self.lobby.id(),
            %conn,
            players = self.lobby.player_count(),
            "player joined"
        );

        // Mid-round joiners are seated immediately but only enter play at
        // the next question; the running one never waits for them.
        self.dispatch(
            Recipient::One(conn),
            ServerEvent::LobbyJoined {
                lobby: self.lobby.snapshot(),
            },
        );
        self.dispatch(
            Recipient::AllExcept(conn),
            ServerEvent::PlayerJoined {
                lobby: self.lobby.snapshot(),
                player_name,
            },
        );
        Ok(())
    }

    fn handle_leave(&mut self, conn: ConnectionId, notify: bool) -> LeaveOutcome {
        let Some(departure) = self.lobby.remove_player(conn) else {
            return LeaveOutcome::default();
        };

        if notify {
            self.dispatch(Recipient::One(conn), ServerEvent::LobbyLeft);
        }
        self.senders.remove(&conn);
        self.books.remove(&conn);

        tracing::info!(
            lobby_id = %self.lobby.id(),
            %conn,
            players = self.lobby.player_count(),
            "player left"
        );

        let departed = DepartedPlayer {
            name: departure.player.name.clone(),
            account: departure.player.account.clone(),
        };

        if departure.now_empty {
            self.timer = None;
            self.round = None;
            self.staged = None;
            if let Some(supply) = self.supply.take() {
                supply.stop();
            }
            return LeaveOutcome {
                departed: Some(departed),
                now_empty: true,
            };
        }

        if let Some(new_host) = departure.new_host {
            tracing::debug!(lobby_id = %self.lobby.id(), %new_host, "host role transferred");
        }

        self.dispatch(
            Recipient::All,
            ServerEvent::PlayerLeft {
                lobby: self.lobby.snapshot(),
                player_name: departure.player.name,
            },
        );

        let mid_round = self.lobby.status().in_round();
        let completed = match &mut self.round {
            Some(round) => {
                round.drop_participant(conn);
                round.all_answered()
            }
            None => false,
        };

        if mid_round && self.lobby.player_count() == 1 {
            // Everyone else abandoned the round; the last player standing
            // takes it regardless of score.
            if let Some(last) = self.lobby.connections().first().copied() {
                tracing::info!(lobby_id = %self.lobby.id(), winner = %last, "last player standing");
                self.end_round(Some(last));
            }
        } else if completed && !self.end_pending() {
            self.arm_timer(
                self.config.next_after_all_answered,
                TimerAction::DeliverQuestion,
            );
        }

        LeaveOutcome {
            departed: Some(departed),
            now_empty: false,
        }
    }

    // -----------------------------------------------------------------------
    // Waiting room
    // -----------------------------------------------------------------------

    fn handle_toggle_ready(&mut self, conn: ConnectionId) {
        if self.lobby.toggle_ready(conn).is_some() {
            self.dispatch(
                Recipient::All,
                ServerEvent::LobbyUpdated {
                    lobby: self.lobby.snapshot(),
                },
            );
        }
    }

    async fn handle_start_game(&mut self, conn: ConnectionId) -> Result<(), GameError> {
        if !self.lobby.is_host_conn(conn) {
            return Err(GameError::NotHost);
        }
        if self.lobby.status() != LobbyStatus::Waiting {
            return Err(GameError::GameAlreadyStarted);
        }
        if !self.lobby.can_start() {
            return Err(GameError::PlayersNotReady);
        }

        self.begin_round().await;
        tracing::info!(
            lobby_id = %self.lobby.id(),
            players = self.lobby.player_count(),
            "game started"
        );
        self.dispatch(
            Recipient::All,
            ServerEvent::GameStarted {
                lobby: self.lobby.snapshot(),
                win_score: self.config.win_score,
            },
        );
        self.arm_timer(self.config.first_question_delay, TimerAction::DeliverQuestion);
        Ok(())
    }

    /// Resets scores and powers, spins up a fresh question supply, and
    /// stages its first question. The caller announces the round and arms
    /// the delivery timer.
    async fn begin_round(&mut self) {
        self.lobby.reset_scores();
        for book in self.books.values_mut() {
            book.reset_for_new_round();
        }
        self.questions_delivered = 0;
        self.round = None;
        self.timer = None;

        let supply = QuestionSupply::start(Arc::clone(&self.source), self.config.supply);
        self.staged = Some(supply.draw_first().await);
        self.supply = Some(supply);
        self.lobby.set_status(LobbyStatus::Playing);
    }

    // -----------------------------------------------------------------------
    // Questions and answers
    // -----------------------------------------------------------------------

    /// Takes the staged question if one is waiting, otherwise pulls from
    /// the supply.
    async fn advance_question(&mut self) -> Result<(), GameError> {
        let question = match self.staged.take() {
            Some(q) => q,
            None => {
                let supply = self.supply.as_ref().ok_or(GameError::NoActiveGame)?;
                supply
                    .dequeue()
                    .await
                    .map_err(|_| GameError::QuestionSupplyExhausted)?
            }
        };
        self.deliver_question(question);
        Ok(())
    }

    fn deliver_question(&mut self, question: Question) {
        self.questions_delivered += 1;
        let number = self.questions_delivered;
        let delivered_at = Instant::now();
        let participants: HashSet<ConnectionId> =
            self.lobby.connections().into_iter().collect();

        // Same question for everyone, but each view carries that player's
        // own power catalog, so the frame is built per participant.
        for conn in &participants {
            let powers = self.books.get(conn).map(grant_views).unwrap_or_default();
            self.dispatch(
                Recipient::One(*conn),
                ServerEvent::NewQuestion {
                    question: QuestionView {
                        question: question.text.clone(),
                        options: question.options.clone(),
                        difficulty: question.difficulty.as_str().to_string(),
                        category: question.category.clone(),
                        question_number: number,
                        time_limit: self.config.question_secs,
                        powers,
                    },
                },
            );
        }

        tracing::debug!(
            lobby_id = %self.lobby.id(),
            question_number = number,
            participants = participants.len(),
            "question delivered"
        );
        self.round = Some(RoundState::new(question, number, delivered_at, participants));
        self.arm_timer_at(
            delivered_at + self.config.answer_cutoff(),
            TimerAction::QuestionTimeout,
        );
    }

    fn handle_submit_answer(
        &mut self,
        conn: ConnectionId,
        answer_index: usize,
    ) -> Result<(), GameError> {
        let round = self.round.as_mut().ok_or(GameError::NoActiveGame)?;
        if !round.is_participant(conn) {
            // Seated after delivery; their first question is the next one.
            return Ok(());
        }
        if round.has_answered(conn) {
            return Err(GameError::AlreadyAnswered);
        }

        let latency = round.elapsed();
        let is_correct = round.question().is_correct(answer_index);
        let mut points = 0;
        if is_correct {
            points = score_for_latency(latency);
            if let Some(book) = self.books.get_mut(&conn) {
                if let Some(multiplier) = book.consume_double() {
                    points *= multiplier;
                }
            }
        }
        round.record(
            conn,
            AnswerRecord {
                option_index: Some(answer_index),
                is_correct,
                points,
                latency,
            },
        );

        let correct_answer = round.question().correct_index;
        let explanation = round.question().explanation.clone();
        let (answered, total) = round.progress();
        let all_answered = round.all_answered();

        let (player_name, total_score) = {
            let player = self.lobby.player_mut(conn).ok_or(GameError::NotInLobby)?;
            player.score += points;
            (player.name.clone(), player.score)
        };

        self.dispatch(
            Recipient::One(conn),
            ServerEvent::AnswerResult {
                is_correct,
                points,
                total_score,
                correct_answer,
                explanation,
            },
        );
        self.dispatch(
            Recipient::All,
            ServerEvent::PlayerAnswered {
                player_name,
                answered,
                total,
            },
        );

        if self.end_pending() {
            return Ok(());
        }
        if total_score >= self.config.win_score {
            tracing::info!(
                lobby_id = %self.lobby.id(),
                %conn,
                score = total_score,
                "win threshold reached"
            );
            self.arm_timer(
                self.config.win_delay,
                TimerAction::EndRound { winner: Some(conn) },
            );
            return Ok(());
        }
        if all_answered {
            self.arm_timer(
                self.config.next_after_all_answered,
                TimerAction::DeliverQuestion,
            );
        }
        Ok(())
    }

    /// A client reporting its own countdown hit zero. Trusted only as a
    /// hint: the server-side cutoff still fires regardless, and a report
    /// from a player who already answered is dropped.
    fn handle_time_up(&mut self, conn: ConnectionId) {
        let Some(round) = self.round.as_mut() else {
            return;
        };
        if !round.is_participant(conn) || round.has_answered(conn) {
            return;
        }

        let latency = round.elapsed();
        round.record(conn, AnswerRecord::timed_out(latency));
        let correct_answer = round.question().correct_index;
        let explanation = round.question().explanation.clone();
        let (answered, total) = round.progress();
        let all_answered = round.all_answered();

        let Some((player_name, total_score)) = self
            .lobby
            .player(conn)
            .map(|p| (p.name.clone(), p.score))
        else {
            return;
        };

        self.dispatch(
            Recipient::One(conn),
            ServerEvent::AnswerResult {
                is_correct: false,
                points: 0,
                total_score,
                correct_answer,
                explanation,
            },
        );
        self.dispatch(
            Recipient::All,
            ServerEvent::PlayerAnswered {
                player_name,
                answered,
                total,
            },
        );

        if all_answered && !self.end_pending() {
            self.arm_timer(
                self.config.next_after_all_answered,
                TimerAction::DeliverQuestion,
            );
        }
    }

    /// Server-side answer cutoff: zero out every straggler and move on.
    fn finish_question_timeout(&mut self) {
        let Some(round) = self.round.as_mut() else {
            return;
        };

        let latency = round.elapsed();
        let correct_answer = round.question().correct_index;
        let explanation = round.question().explanation.clone();
        let stragglers = round.unanswered();
        for conn in &stragglers {
            round.record(*conn, AnswerRecord::timed_out(latency));
        }

        for conn in stragglers {
            let total_score = self.lobby.player(conn).map(|p| p.score).unwrap_or_default();
            self.dispatch(
                Recipient::One(conn),
                ServerEvent::AnswerResult {
                    is_correct: false,
                    points: 0,
                    total_score,
                    correct_answer,
                    explanation: explanation.clone(),
                },
            );
        }

        tracing::debug!(lobby_id = %self.lobby.id(), "answer window closed");
        self.arm_timer(self.config.next_after_timeout, TimerAction::DeliverQuestion);
    }

    // -----------------------------------------------------------------------
    // Powers
    // -----------------------------------------------------------------------

    fn handle_use_power(&mut self, conn: ConnectionId, raw: &str) -> Result<(), GameError> {
        let correct_index = match &self.round {
            Some(round) => round.question().correct_index,
            None => return Err(GameError::NoActiveGame),
        };

        let (points, player_name) = {
            let player = self.lobby.player(conn).ok_or(GameError::NotInLobby)?;
            (player.score, player.name.clone())
        };
        let book = self.books.get_mut(&conn).ok_or(GameError::NotInLobby)?;
        let outcome = book.use_power(raw, points)?;

        if let Some(player) = self.lobby.player_mut(conn) {
            player.score = outcome.remaining_points;
        }

        let effect = match outcome.effect {
            PowerEffect::FiftyFifty => PowerEffectView::FiftyFifty { correct_index },
            PowerEffect::DoublePoints { multiplier } => {
                PowerEffectView::DoublePoints { multiplier }
            }
            PowerEffect::TimeBoost { extra_seconds } => {
                self.extend_answer_window(Duration::from_secs(extra_seconds));
                PowerEffectView::TimeBoost { extra_seconds }
            }
        };

        tracing::info!(
            lobby_id = %self.lobby.id(),
            %conn,
            power = %outcome.power,
            cost = outcome.cost,
            "power used"
        );
        self.dispatch(
            Recipient::One(conn),
            ServerEvent::PowerUsed {
                power_type: outcome.power.to_string(),
                cost: outcome.cost,
                remaining_points: outcome.remaining_points,
                effect,
            },
        );
        self.dispatch(
            Recipient::AllExcept(conn),
            ServerEvent::PlayerUsedPower {
                player_name,
                power_type: outcome.power.to_string(),
            },
        );
        Ok(())
    }

    /// Pushes the pending cutoff back. The window is shared, so one
    /// player's boost extends it for every straggler too.
    fn extend_answer_window(&mut self, extra: Duration) {
        if let Some(timer) = &mut self.timer {
            if matches!(timer.action, TimerAction::QuestionTimeout) {
                timer.fires_at += extra;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Round lifecycle
    // -----------------------------------------------------------------------

    async fn handle_timer_fired(&mut self) {
        let Some(timer) = self.timer.take() else {
            return;
        };
        match timer.action {
            TimerAction::DeliverQuestion => {
                if let Err(error) = self.advance_question().await {
                    tracing::warn!(
                        lobby_id = %self.lobby.id(),
                        %error,
                        "cannot continue round, ending it"
                    );
                    self.end_round(None);
                }
            }
            TimerAction::QuestionTimeout => self.finish_question_timeout(),
            TimerAction::EndRound { winner } => self.end_round(winner),
        }
    }

    fn end_round(&mut self, winner_conn: Option<ConnectionId>) {
        self.timer = None;
        self.round = None;
        self.staged = None;
        if let Some(supply) = self.supply.take() {
            supply.stop();
        }

        self.lobby.set_status(LobbyStatus::RoundFinished);
        self.lobby.clear_ready_flags();
        if let Some(promoted) = self.lobby.ensure_host() {
            tracing::debug!(lobby_id = %self.lobby.id(), %promoted, "host repaired at round end");
        }

        let results = self.lobby.ranking();
        let winner = winner_conn.and_then(|c| self.lobby.rank_of(c));

        tracing::info!(
            lobby_id = %self.lobby.id(),
            questions = self.questions_delivered,
            winner = winner.as_ref().map(|w| w.name.as_str()).unwrap_or("none"),
            "round ended"
        );

        // Win persistence must not stall the lobby, so it runs detached.
        if let Some(conn) = winner_conn {
            if let Some(account) = self.lobby.player(conn).and_then(|p| p.account.clone()) {
                let store = Arc::clone(&self.ranking);
                tokio::spawn(async move {
                    if let Err(error) = store.increment_win_count(&account).await {
                        tracing::warn!(%account, %error, "failed to record win");
                    }
                });
            }
        }

        self.dispatch(Recipient::All, ServerEvent::RoundEnded { results, winner });
        self.dispatch(
            Recipient::All,
            ServerEvent::LobbyUpdated {
                lobby: self.lobby.snapshot(),
            },
        );
    }

    fn handle_request_new_round(&mut self, conn: ConnectionId) -> Result<(), GameError> {
        if !self.lobby.is_host_conn(conn) {
            return Err(GameError::NotHost);
        }
        if self.lobby.status() != LobbyStatus::RoundFinished {
            return Ok(());
        }
        self.lobby.set_status(LobbyStatus::WaitingNewRound);
        // Proposing counts as confirming.
        self.lobby.mark_ready(conn);
        self.dispatch(
            Recipient::All,
            ServerEvent::WaitingNewRound {
                lobby: self.lobby.snapshot(),
            },
        );
        Ok(())
    }

    async fn handle_ready_for_new_round(&mut self, conn: ConnectionId) {
        if self.lobby.status() != LobbyStatus::WaitingNewRound {
            return;
        }
        self.lobby.mark_ready(conn);

        if self.lobby.all_ready_strict() {
            self.begin_round().await;
            tracing::info!(lobby_id = %self.lobby.id(), "rematch starting");
            self.dispatch(
                Recipient::All,
                ServerEvent::NewRoundStarted {
                    lobby: self.lobby.snapshot(),
                },
            );
            self.arm_timer(self.config.first_question_delay, TimerAction::DeliverQuestion);
        } else {
            self.dispatch(
                Recipient::All,
                ServerEvent::LobbyUpdated {
                    lobby: self.lobby.snapshot(),
                },
            );
        }
    }

    fn handle_back_to_lobby(&mut self, conn: ConnectionId) -> Result<(), GameError> {
        if !self.lobby.is_host_conn(conn) {
            return Err(GameError::NotHost);
        }
        if !matches!(
            self.lobby.status(),
            LobbyStatus::RoundFinished | LobbyStatus::WaitingNewRound
        ) {
            return Ok(());
        }

        self.timer = None;
        self.round = None;
        self.staged = None;
        if let Some(supply) = self.supply.take() {
            supply.stop();
        }
        self.questions_delivered = 0;

        self.lobby.set_status(LobbyStatus::Waiting);
        self.lobby.reset_ready_defaults();
        self.lobby.reset_scores();
        for book in self.books.values_mut() {
            book.reset_for_new_round();
        }

        self.dispatch(
            Recipient::All,
            ServerEvent::ReturnedToLobby {
                lobby: self.lobby.snapshot(),
            },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Chat and plumbing
    // -----------------------------------------------------------------------

    fn handle_chat(&mut self, conn: ConnectionId, message: String) -> Result<(), GameError> {
        let player_name = self
            .lobby
            .player(conn)
            .map(|p| p.name.clone())
            .ok_or(GameError::NotInLobby)?;
        self.dispatch(
            Recipient::All,
            ServerEvent::ChatMessage {
                player_name,
                message,
                timestamp: now_epoch_ms(),
            },
        );
        Ok(())
    }

    fn arm_timer(&mut self, delay: Duration, action: TimerAction) {
        self.arm_timer_at(Instant::now() + delay, action);
    }

    fn arm_timer_at(&mut self, fires_at: Instant, action: TimerAction) {
        self.timer = Some(GameTimer { fires_at, action });
    }

    /// Whether the armed timer already ends the round. Nothing may replace
    /// it once set: the round outcome is decided.
    fn end_pending(&self) -> bool {
        matches!(
            self.timer,
            Some(GameTimer {
                action: TimerAction::EndRound { .. },
                ..
            })
        )
    }

    /// Fans an event out to its recipients. A closed sender means the
    /// socket writer is gone; the disconnect cleanup will unseat the
    /// player shortly, so failed sends are dropped silently.
    fn dispatch(&self, recipient: Recipient, event: ServerEvent) {
        match recipient {
            Recipient::All => {
                for sender in self.senders.values() {
                    let _ = sender.send(event.clone());
                }
            }
            Recipient::One(conn) => {
                if let Some(sender) = self.senders.get(&conn) {
                    let _ = sender.send(event);
                }
            }
            Recipient::AllExcept(skip) => {
                for (conn, sender) in &self.senders {
                    if *conn != skip {
                        let _ = sender.send(event.clone());
                    }
                }
            }
        }
    }

    /// Routes a rejection to its origin. Power refusals go out as
    /// [`ServerEvent::PowerError`] so clients keep their power UI state
    /// separate from general failures. Never broadcast.
    fn send_error(&self, conn: ConnectionId, error: &GameError) {
        tracing::debug!(lobby_id = %self.lobby.id(), %conn, %error, "action rejected");
        let event = if error.is_power_error() {
            ServerEvent::PowerError {
                message: error.to_string(),
            }
        } else {
            ServerEvent::Error {
                message: error.to_string(),
            }
        };
        self.dispatch(Recipient::One(conn), event);
    }
}

fn grant_views(book: &PowerBook) -> Vec<PowerGrantView> {
    book.grants()
        .into_iter()
        .map(|g| PowerGrantView {
            power_type: g.power.to_string(),
            cost: g.cost,
            consumed: g.consumed,
        })
        .collect()
}

/// Wall-clock milliseconds for `created_at` stamps and chat timestamps.
pub(crate) fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
