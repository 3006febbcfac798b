use std::sync::Arc;

use tokio::{
    sync::{broadcast, mpsc, oneshot, Mutex},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::{
    core::engine::{PairingEngine, PairingError, PairingState},
    op::StoredRound,
    pairing::{Match, Ranking, Round},
    persist::{PersistError, RoundSink},
    types::RoundSeq,
};

use super::events::PairingEvent;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Pairing(#[from] PairingError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("pairing runtime is no longer running")]
    ChannelClosed,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Write each selected round through to the sink immediately.
    pub flush_on_select: bool,
    /// Rounds buffered before the worker appends a batch.
    pub batch_max_rounds: usize,
    /// Longest a buffered round waits before being appended.
    pub batch_max_latency_ms: u64,
    /// Capacity of the queue between the command loop and the worker.
    pub persist_queue_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_select: true,
            batch_max_rounds: 8,
            batch_max_latency_ms: 75,
            persist_queue_bound: 16,
        }
    }
}

/// Cloneable handle to a running pairing engine.
///
/// Every selection goes through one command loop, so concurrent callers
/// never interleave mutations of the schedule.
#[derive(Clone)]
pub struct PairingHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<PairingEvent>,
}

enum Command {
    SelectFirstRound {
        resp: oneshot::Sender<Result<Round, RuntimeError>>,
    },
    SelectContaining {
        anchor: Match,
        resp: oneshot::Sender<Result<Round, RuntimeError>>,
    },
    SelectByRanking {
        ranking: Ranking,
        resp: oneshot::Sender<Result<Round, RuntimeError>>,
    },
    State {
        resp: oneshot::Sender<PairingState>,
    },
    Remaining {
        resp: oneshot::Sender<Vec<Round>>,
    },
    Flush {
        resp: oneshot::Sender<Result<RoundSeq, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum Selector {
    First,
    Containing(Match),
    ByRanking(Ranking),
}

enum PersistMsg {
    Round(StoredRound),
    Flush {
        resp: oneshot::Sender<Result<RoundSeq, PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Starts the command loop for `engine`.
///
/// With a sink, the tournament header and any rounds the engine selected
/// before spawning are written synchronously first. A sink holding a
/// different tournament is rejected here, before any round is handed out.
pub fn spawn_pairing(
    mut engine: PairingEngine,
    sink: Option<Box<dyn RoundSink>>,
    config: RuntimeConfig,
) -> Result<PairingHandle, RuntimeError> {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(64);
    let (events_tx, _) = broadcast::channel::<PairingEvent>(256);

    let backlog = engine.drain_pending_rounds();
    let (persist_tx_opt, mut durable_rx) = if let Some(mut sink) = sink {
        sink.write_header(&engine.export_state())?;
        if !backlog.is_empty() {
            sink.append_rounds(&backlog)?;
            sink.flush()?;
        }

        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound);
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<RoundSeq, PersistError>>();
        spawn_persistence_worker(
            sink,
            engine.rounds_selected(),
            persist_rx,
            durable_tx,
            config.clone(),
        );
        (Some(persist_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut engine = engine;

        loop {
            if let Some(rx) = durable_rx.as_mut() {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break; };
                        if handle_command(cmd, &mut engine, &events_tx_loop, persist_tx_opt.as_ref()).await {
                            break;
                        }
                    }
                    durable = rx.recv() => {
                        match durable {
                            Some(Ok(round_seq)) => {
                                let _ = events_tx_loop.send(PairingEvent::DurableUpTo { round_seq });
                            }
                            Some(Err(err)) => warn!(%err, "round persistence failed"),
                            None => {}
                        }
                    }
                }
            } else {
                let Some(cmd) = cmd_rx.recv().await else { break; };
                if handle_command(cmd, &mut engine, &events_tx_loop, persist_tx_opt.as_ref()).await {
                    break;
                }
            }
        }
    });

    Ok(PairingHandle { cmd_tx, events_tx })
}

impl PairingHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<PairingEvent> {
        self.events_tx.subscribe()
    }

    pub async fn select_first_round(&self) -> Result<Round, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SelectFirstRound { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn select_round_containing(&self, anchor: Match) -> Result<Round, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SelectContaining { anchor, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn select_round_by_ranking(&self, ranking: Ranking) -> Result<Round, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SelectByRanking { ranking, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn state(&self) -> Result<PairingState, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::State { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn remaining(&self) -> Result<Vec<Round>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Remaining { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Waits until every selected round is durable and returns the
    /// highest durable round number.
    pub async fn flush(&self) -> Result<RoundSeq, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    async fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_command(
    cmd: Command,
    engine: &mut PairingEngine,
    events_tx: &broadcast::Sender<PairingEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
) -> bool {
    match cmd {
        Command::SelectFirstRound { resp } => {
            let res = select(engine, Selector::First, events_tx, persist_tx);
            let _ = resp.send(res);
        }
        Command::SelectContaining { anchor, resp } => {
            let res = select(engine, Selector::Containing(anchor), events_tx, persist_tx);
            let _ = resp.send(res);
        }
        Command::SelectByRanking { ranking, resp } => {
            let res = select(engine, Selector::ByRanking(ranking), events_tx, persist_tx);
            let _ = resp.send(res);
        }
        Command::State { resp } => {
            let _ = resp.send(engine.export_state());
        }
        Command::Remaining { resp } => {
            let _ = resp.send(engine.remaining().to_vec());
        }
        Command::Flush { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (flush_tx, flush_rx) = oneshot::channel();
                if tx.send(PersistMsg::Flush { resp: flush_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    flush_rx
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                }
            } else {
                Ok(engine.rounds_selected())
            };
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (done_tx, done_rx) = oneshot::channel();
                if tx.send(PersistMsg::Shutdown { resp: done_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

fn select(
    engine: &mut PairingEngine,
    selector: Selector,
    events_tx: &broadcast::Sender<PairingEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
) -> Result<Round, RuntimeError> {
    // A selection commits exactly one round, so one queue slot is reserved
    // up front; a full queue leaves the engine untouched.
    let mut permit = persist_tx
        .map(|tx| tx.try_reserve())
        .transpose()
        .map_err(|err| {
            RuntimeError::Persist(PersistError::Message(format!("persist queue error: {err}")))
        })?;

    let round = match selector {
        Selector::First => engine.select_first_round(),
        Selector::Containing(anchor) => engine.select_round_containing(anchor),
        Selector::ByRanking(ranking) => engine.select_round_by_ranking(&ranking),
    }?;

    for stored in engine.drain_pending_rounds() {
        let (seq, selection) = (stored.seq, stored.selection);
        if let Some(permit) = permit.take() {
            permit.send(PersistMsg::Round(stored));
        }
        let _ = events_tx.send(PairingEvent::RoundSelected { seq, selection });
        if persist_tx.is_none() {
            let _ = events_tx.send(PairingEvent::DurableUpTo { round_seq: seq });
        }
    }

    if engine.is_exhausted() {
        let _ = events_tx.send(PairingEvent::Exhausted);
    }
    Ok(round)
}

fn spawn_persistence_worker(
    sink: Box<dyn RoundSink>,
    already_durable: RoundSeq,
    mut rx: mpsc::Receiver<PersistMsg>,
    durable_tx: mpsc::UnboundedSender<Result<RoundSeq, PersistError>>,
    config: RuntimeConfig,
) {
    let sink = Arc::new(Mutex::new(sink));
    tokio::spawn(async move {
        let mut buf = Vec::<StoredRound>::new();
        let mut deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
        let mut last_durable: RoundSeq = already_durable;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                        break;
                    };

                    match msg {
                        PersistMsg::Round(stored) => {
                            buf.push(stored);

                            if buf.len() >= config.batch_max_rounds || config.flush_on_select {
                                let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                                deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                            }
                        }
                        PersistMsg::Flush { resp } => {
                            let result = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(result.map(|_| last_durable));
                            deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                        }
                        PersistMsg::Shutdown { resp } => {
                            let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !buf.is_empty() => {
                    let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, false).await;
                    deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                }
            }
        }
    });
}

async fn flush_buf(
    sink: &Arc<Mutex<Box<dyn RoundSink>>>,
    buf: &mut Vec<StoredRound>,
    last_durable: &mut RoundSeq,
    durable_tx: &mpsc::UnboundedSender<Result<RoundSeq, PersistError>>,
    call_flush: bool,
) -> Result<(), PersistError> {
    if buf.is_empty() {
        if call_flush {
            let sink_ref = Arc::clone(sink);
            tokio::task::spawn_blocking(move || {
                let mut sink = sink_ref.blocking_lock();
                sink.flush()
            })
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))??;
        }
        return Ok(());
    }

    let rounds = std::mem::take(buf);
    let sink_ref = Arc::clone(sink);
    let append_res: Result<RoundSeq, PersistError> = tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        let seq = sink.append_rounds(&rounds)?;
        if call_flush {
            sink.flush()?;
        }
        Ok(seq)
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?;

    match append_res {
        Ok(seq) => {
            *last_durable = (*last_durable).max(seq);
            debug!(round_seq = *last_durable, "rounds durable");
            let _ = durable_tx.send(Ok(*last_durable));
            Ok(())
        }
        Err(err) => {
            let _ = durable_tx.send(Err(PersistError::Message(format!("append failed: {err}"))));
            Err(err)
        }
    }
}
