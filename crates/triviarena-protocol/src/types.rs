//! Core protocol types for Triviarena's wire format.
//!
//! Everything in this module travels on the wire: these are the structures
//! that get serialized to JSON, sent over the WebSocket, and deserialized on
//! the other side. Clients send exactly one kind of frame ([`ClientAction`])
//! and receive exactly one kind of frame ([`ServerEvent`]).
//!
//! The shapes here are a contract with client code. Changing a field name or
//! a tag string breaks every deployed client, which is why the test module
//! below pins the exact JSON for each.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for one WebSocket connection.
///
/// Newtype over `u64` so a connection id cannot be confused with a score or
/// an option index in a signature. Assigned by the server when the socket is
/// accepted, never reused within a process lifetime.
///
/// `#[serde(transparent)]` makes `ConnectionId(42)` serialize as plain `42`,
/// which is what client SDKs expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A short, human-relayable lobby code, e.g. `"K7QX2M"`.
///
/// Stored as a `String` because players type and share these; the server
/// generates them as 6 uppercase alphanumerics and re-rolls on collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LobbyId(pub String);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LobbyId {
    fn from(s: &str) -> Self {
        LobbyId(s.to_owned())
    }
}

/// A stable identity from the external account system.
///
/// Opaque to this server: it arrives with create/join actions (issued by an
/// authentication service that is not part of this process) and is only ever
/// compared for equality and forwarded to the ranking store. Anonymous
/// players simply have none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive an event?
// ---------------------------------------------------------------------------

/// Specifies who should receive a server event within a lobby.
///
/// Game code produces `(Recipient, ServerEvent)` pairs; the dispatch layer
/// resolves each recipient against the lobby's live connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every player in the lobby.
    All,

    /// One specific player. Used for personalized question payloads,
    /// answer results, and error reports.
    One(ConnectionId),

    /// Everyone except the named player. Used for "someone else did a
    /// thing" notices such as [`ServerEvent::PlayerUsedPower`].
    AllExcept(ConnectionId),
}

// ---------------------------------------------------------------------------
// Lobby status
// ---------------------------------------------------------------------------

/// The lifecycle phase of a lobby. Serialized into every snapshot.
///
/// ```text
/// waiting ──start──▶ playing ──round over──▶ round_finished
///    ▲                  ▲                        │    │
///    │                  └──all ready──waiting_new_round
///    └────────────────back to lobby──────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LobbyStatus {
    /// Players are gathering; the lobby shows up in public listings.
    #[default]
    Waiting,

    /// A round is running: questions are being streamed and scored.
    Playing,

    /// A round just ended; the ranking has been announced and the host
    /// decides what happens next.
    RoundFinished,

    /// The host asked for a rematch; waiting for every player to confirm.
    WaitingNewRound,
}

impl LobbyStatus {
    /// Whether the lobby should appear in the open-lobby listing.
    pub fn is_open(self) -> bool {
        matches!(self, LobbyStatus::Waiting)
    }

    /// Whether ready flags may be toggled in this phase.
    pub fn accepts_ready_toggle(self) -> bool {
        matches!(self, LobbyStatus::Waiting | LobbyStatus::WaitingNewRound)
    }

    /// Whether a round is currently in progress.
    pub fn in_round(self) -> bool {
        matches!(self, LobbyStatus::Playing)
    }
}

impl fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LobbyStatus::Waiting => "waiting",
            LobbyStatus::Playing => "playing",
            LobbyStatus::RoundFinished => "round_finished",
            LobbyStatus::WaitingNewRound => "waiting_new_round",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Snapshots (server → client views of lobby state)
// ---------------------------------------------------------------------------

/// One player's row in a lobby snapshot.
///
/// Deliberately omits the account id; identities are never echoed to other
/// players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub connection_id: ConnectionId,
    pub name: String,
    pub is_host: bool,
    pub ready: bool,
    pub score: u32,
}

/// The full client-visible state of a lobby, broadcast after every
/// membership or status mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySnapshot {
    pub id: LobbyId,
    pub host: ConnectionId,
    pub players: Vec<PlayerSnapshot>,
    pub max_players: usize,
    pub status: LobbyStatus,
    /// Epoch milliseconds at creation.
    pub created_at: u64,
}

/// A row in the open-lobby listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub id: LobbyId,
    pub host_name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub status: LobbyStatus,
}

// ---------------------------------------------------------------------------
// Question and power views
// ---------------------------------------------------------------------------

/// A power offer attached to a question payload.
///
/// `cost` is the catalog base cost (what the client displays); the actual
/// charge at use time carries the point surcharge and is reported in
/// [`ServerEvent::PowerUsed`]. `consumed` marks a power already spent this
/// round, still listed so the client can render it greyed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerGrantView {
    pub power_type: String,
    pub cost: u32,
    pub consumed: bool,
}

/// The personalized question payload sent to each player.
///
/// The correct answer index is withheld here; it is only revealed in
/// [`ServerEvent::AnswerResult`] after the player has answered, or through a
/// fifty-fifty power effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub question: String,
    pub options: Vec<String>,
    pub difficulty: String,
    pub category: String,
    /// 1-based sequence number within the round.
    pub question_number: u32,
    /// Answer window in seconds.
    pub time_limit: u64,
    /// This player's power offers for this question.
    pub powers: Vec<PowerGrantView>,
}

/// The visible effect of a successfully used power.
///
/// Tagged by `kind` so clients can switch on it:
/// `{ "kind": "fifty_fifty", "correct_index": 2 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PowerEffectView {
    /// The client hides two wrong options; only the requester learns the
    /// correct index.
    FiftyFifty { correct_index: usize },

    /// The player's next correct answer this round is multiplied.
    DoublePoints { multiplier: u32 },

    /// Extra seconds granted on the current question.
    TimeBoost { extra_seconds: u64 },
}

/// One row of the end-of-round ranking, best first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankEntry {
    pub name: String,
    pub score: u32,
    /// 1-based position.
    pub rank: usize,
}

// ---------------------------------------------------------------------------
// ClientAction: everything a client may send
// ---------------------------------------------------------------------------

/// Every frame a client can send, internally tagged:
/// `{ "action": "submit_answer", "answer_index": 2 }`.
///
/// Unknown tags fail to parse; the server answers with an `error` event and
/// keeps the connection open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    /// Open a new lobby and become its host.
    CreateLobby {
        player_name: String,
        /// Stable identity for ranking persistence; absent for anonymous play.
        account: Option<AccountId>,
        /// Seat limit; the server applies its default when omitted.
        max_players: Option<usize>,
    },

    /// Take a seat in an existing lobby by its code.
    JoinLobby {
        lobby_id: LobbyId,
        player_name: String,
        account: Option<AccountId>,
    },

    /// Give up the seat (also implied by a dropped socket).
    LeaveLobby,

    /// Ask for the open-lobby listing.
    ListLobbies,

    /// Flip the ready flag while gathering in the waiting room.
    ToggleReady,

    /// Host only: begin the round.
    StartGame,

    /// Answer the current question.
    SubmitAnswer { answer_index: usize },

    /// The client's local countdown ran out without an answer.
    TimeUp,

    /// Spend points on a power. The identifier is free-form on the wire and
    /// validated by the power engine.
    UsePower { power_type: String },

    /// Host only, after a round: propose a rematch.
    RequestNewRound,

    /// Confirm readiness for the proposed rematch.
    ReadyForNewRound,

    /// Host only, after a round: return everyone to the waiting room.
    BackToLobby,

    /// Free-text chat, relayed verbatim to the lobby.
    ChatMessage { message: String },
}

// ---------------------------------------------------------------------------
// ServerEvent: everything the server may emit
// ---------------------------------------------------------------------------

/// Every frame the server can emit, internally tagged:
/// `{ "event": "new_question", "question": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame on every connection, carrying the assigned id.
    Connected { connection_id: ConnectionId },

    /// To the creator after a successful create.
    LobbyCreated { lobby: LobbySnapshot },

    /// To the joiner after a successful join.
    LobbyJoined { lobby: LobbySnapshot },

    /// To the rest of the lobby when someone joins.
    PlayerJoined {
        lobby: LobbySnapshot,
        player_name: String,
    },

    /// To the rest of the lobby when someone leaves or drops.
    PlayerLeft {
        lobby: LobbySnapshot,
        player_name: String,
    },

    /// To the leaver, confirming the seat was released.
    LobbyLeft,

    /// To the last leaver when their departure destroyed the lobby.
    LobbyClosed { lobby_id: LobbyId },

    /// Response to a listing request. Only `waiting` lobbies appear.
    LobbyList { lobbies: Vec<LobbySummary> },

    /// Catch-all snapshot broadcast after any lobby mutation.
    LobbyUpdated { lobby: LobbySnapshot },

    /// The round began. `win_score` is the points threshold that ends it.
    GameStarted {
        lobby: LobbySnapshot,
        win_score: u32,
    },

    /// Personalized per player: same question, that player's own powers.
    NewQuestion { question: QuestionView },

    /// To the answerer only: the verdict on their submission, including the
    /// after-the-fact reveal of the correct index.
    AnswerResult {
        is_correct: bool,
        points: u32,
        total_score: u32,
        correct_answer: usize,
        explanation: String,
    },

    /// To the lobby: progress notice that someone locked in an answer.
    PlayerAnswered {
        player_name: String,
        answered: usize,
        total: usize,
    },

    /// To the requester: the power took effect.
    PowerUsed {
        power_type: String,
        /// Actual points charged (base cost with surcharge applied).
        cost: u32,
        remaining_points: u32,
        effect: PowerEffectView,
    },

    /// To everyone else: someone used a power (no effect details leaked).
    PlayerUsedPower {
        player_name: String,
        power_type: String,
    },

    /// To the requester: the power was refused.
    PowerError { message: String },

    /// To the lobby: the round is over. `winner` is absent only when the
    /// lobby emptied out mid-round.
    RoundEnded {
        results: Vec<RankEntry>,
        winner: Option<RankEntry>,
    },

    /// To the lobby: host proposed a rematch, confirmations pending.
    WaitingNewRound { lobby: LobbySnapshot },

    /// To the lobby: everyone confirmed, a fresh round is starting.
    NewRoundStarted { lobby: LobbySnapshot },

    /// To the lobby: host sent everyone back to the waiting room.
    ReturnedToLobby { lobby: LobbySnapshot },

    /// Relayed chat line.
    ChatMessage {
        player_name: String,
        message: String,
        /// Epoch milliseconds at relay time.
        timestamp: u64,
    },

    /// To the originator of a rejected action. Never broadcast.
    Error { message: String },
}

// =========================================================================
// Tests
// =========================================================================
