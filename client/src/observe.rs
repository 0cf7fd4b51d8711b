//! Game observation
//!
//! Each watched game gets its own listener holding a [`GameWatch`]. The
//! listener turns the game's lines into [`ObservationEvent`]s and settles the
//! outcome when the server drops the game from the observation list.

use crate::command::Reply;
use crate::error::Result;
use crate::registry::{Detach, Flow, LineListener, Outbox};
use log::{debug, info};
use protocol::catalog::{game_classifier, GameLine};
use protocol::{GameChat, GameStart, LogicalLine, PlyUpdate};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationEvent {
    Started(GameStart),
    Move(PlyUpdate),
    Chat(GameChat),
}

/// Per-game watch state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameWatch {
    pub game: u32,
    pub started: bool,
    /// Announced before the game leaves the observation list
    pub result: Option<String>,
}

type Classifier = Box<dyn Fn(&str) -> Option<GameLine> + Send>;

pub struct ObservationListener {
    watch: GameWatch,
    classify: Classifier,
    events: mpsc::UnboundedSender<ObservationEvent>,
    outcome: Option<oneshot::Sender<Result<Option<String>>>>,
}

impl ObservationListener {
    fn emit(&mut self, event: ObservationEvent) {
        if self.events.send(event).is_err() {
            debug!("Game {} event dropped, nobody is listening", self.watch.game);
        }
    }

    fn settle(&mut self, outcome: Result<Option<String>>) {
        if let Some(tx) = self.outcome.take() {
            let _ = tx.send(outcome);
        }
    }

    fn abandoned(&self) -> bool {
        self.events.is_closed() && self.outcome.as_ref().map_or(true, |tx| tx.is_closed())
    }
}

impl LineListener for ObservationListener {
    fn on_line(&mut self, line: &LogicalLine, _outbox: &mut Outbox) -> Flow {
        if self.abandoned() {
            return Flow::Done;
        }

        let Some(parsed) = (self.classify)(line.text()) else {
            return Flow::Continue;
        };

        match parsed {
            GameLine::Start(start) => {
                if !self.watch.started {
                    self.watch.started = true;
                    self.emit(ObservationEvent::Started(start));
                }
            }
            GameLine::Ply(ply) => self.emit(ObservationEvent::Move(ply)),
            GameLine::Chat(chat) => self.emit(ObservationEvent::Chat(chat)),
            GameLine::Result { result, .. } => {
                debug!("Game {} ended: {}", self.watch.game, result);
                self.watch.result = Some(result);
            }
            GameLine::Removed { .. } => {
                info!("Game {} removed from observation list", self.watch.game);
                let result = self.watch.result.take();
                self.settle(Ok(result));
                return Flow::Done;
            }
        }

        Flow::Continue
    }

    /// Cancelling is a normal end without a result
    fn on_detach(&mut self, reason: Detach) {
        match reason {
            Detach::Cancelled => self.settle(Ok(None)),
            Detach::Closed => self.settle(Err(reason.into())),
        }
    }
}

/// Caller's side of a watch: an event stream plus the final outcome
pub struct Observation {
    game: u32,
    events: mpsc::UnboundedReceiver<ObservationEvent>,
    outcome: Reply<Option<String>>,
}

impl Observation {
    pub fn game(&self) -> u32 {
        self.game
    }

    /// Next event, or `None` once the watch has ended and every event was read
    pub async fn next_event(&mut self) -> Option<ObservationEvent> {
        self.events.recv().await
    }

    /// Waits for the game to leave the observation list
    ///
    /// Yields the announced result (such as `1-0`), `None` when the watch was
    /// cancelled or the game vanished without one.
    pub async fn finish(self) -> Result<Option<String>> {
        self.outcome.await
    }
}

/// Creates the listener and the handle for one game
pub fn watch(game: u32) -> (ObservationListener, Observation) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome) = Reply::channel();

    let listener = ObservationListener {
        watch: GameWatch {
            game,
            ..GameWatch::default()
        },
        classify: Box::new(game_classifier(game)),
        events: events_tx,
        outcome: Some(outcome_tx),
    };

    let observation = Observation {
        game,
        events: events_rx,
        outcome,
    };

    (listener, observation)
}
