//! The run pipeline: lock, execute, translate, deliver.
//!
//! One [`RunPipeline::execute`] call owns a run end to end. The agent
//! runs on its own task and feeds the producer queue; the returned
//! stream drives translation and delivery in lockstep with the client.
//! The session lock is released by a guard on every exit path, including
//! a client that walks away mid-stream.

use std::sync::Arc;

use async_stream::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use weft_contract::{
    Agent, AgentError, AgentEvent, AgentFactory, AgentRunRequest, RunInput, SessionKey,
    SessionStore,
};
use weft_protocol_ag_ui::{Event, EventTranslator};

use crate::handlers::HandlerSet;
use crate::lock::SessionLockHandler;
use crate::queue::{event_queue, EventQueueReceiver, EventQueueSender};

/// Everything one run owns: identity, input, and its two queues.
pub struct RunContext {
    pub key: SessionKey,
    pub input: RunInput,
    pub initial_state: Value,
    producer_tx: EventQueueSender<Result<AgentEvent, AgentError>>,
    producer_rx: EventQueueReceiver<Result<AgentEvent, AgentError>>,
    consumer_tx: EventQueueSender<Event>,
    consumer_rx: EventQueueReceiver<Event>,
}

impl RunContext {
    pub fn new(key: SessionKey, input: RunInput, initial_state: Value) -> Self {
        let (producer_tx, producer_rx) = event_queue();
        let (consumer_tx, consumer_rx) = event_queue();
        Self {
            key,
            input,
            initial_state,
            producer_tx,
            producer_rx,
            consumer_tx,
            consumer_rx,
        }
    }

    /// Sender for injecting canonical events from outside the run; they
    /// interleave with translated output and stop flowing once the run's
    /// terminal event has sealed the queue.
    pub fn event_injector(&self) -> EventQueueSender<Event> {
        self.consumer_tx.clone()
    }
}

/// Builds run streams. One instance serves a whole deployment; each
/// `execute` call is independent.
pub struct RunPipeline {
    factory: Arc<dyn AgentFactory>,
    store: Arc<dyn SessionStore>,
    handlers: HandlerSet,
    snapshot_on_complete: bool,
    attach_raw_events: bool,
}

impl RunPipeline {
    pub fn new(factory: Arc<dyn AgentFactory>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            factory,
            store,
            handlers: HandlerSet::new(),
            snapshot_on_complete: false,
            attach_raw_events: false,
        }
    }

    pub fn with_handlers(mut self, handlers: HandlerSet) -> Self {
        self.handlers = handlers;
        self
    }

    /// Emit a `STATE_SNAPSHOT` of final session state before
    /// `RUN_FINISHED`.
    pub fn with_snapshot_on_complete(mut self, enabled: bool) -> Self {
        self.snapshot_on_complete = enabled;
        self
    }

    /// Attach each internal event to the canonical events translated
    /// from it.
    pub fn with_raw_events(mut self, enabled: bool) -> Self {
        self.attach_raw_events = enabled;
        self
    }

    /// Runs the agent for this context and returns the canonical event
    /// stream the client consumes.
    pub fn execute(&self, ctx: RunContext) -> BoxStream<'static, Event> {
        let factory = self.factory.clone();
        let store = self.store.clone();
        let handlers = self.handlers.clone();
        let snapshot_on_complete = self.snapshot_on_complete;
        let attach_raw_events = self.attach_raw_events;

        let RunContext {
            key,
            input,
            initial_state,
            producer_tx,
            mut producer_rx,
            consumer_tx,
            mut consumer_rx,
        } = ctx;

        let out = stream! {
            if !handlers.lock.lock(&key).await {
                yield handlers
                    .recorder
                    .record_output(handlers.lock.locked_response(&key))
                    .await;
                return;
            }
            let mut guard = RunGuard::new(handlers.lock.clone(), key.clone());

            handlers.recorder.record_input(&input).await;

            if let Err(e) = store.get_or_create(&key, initial_state.clone()).await {
                warn!(session = %key, error = %e, "failed to prepare session");
                yield handlers
                    .recorder
                    .record_output(
                        Event::execution_error(e.to_string())
                            .with_timestamp(Event::now_millis()),
                    )
                    .await;
                return;
            }
            if let Some(user_message) = input.latest_user_message() {
                let seed = AgentEvent::user_text(&user_message.content);
                if let Err(e) = store.append_events(&key, std::slice::from_ref(&seed)).await {
                    warn!(session = %key, error = %e, "failed to record run input");
                }
            }

            let thread_id = input.thread_id.clone();
            let run_id = input.run_id.clone();
            yield handlers
                .recorder
                .record_output(
                    Event::run_started(&thread_id, &run_id).with_timestamp(Event::now_millis()),
                )
                .await;

            let agent = factory.create_agent();
            let request = AgentRunRequest {
                key: key.clone(),
                input: input.clone(),
                initial_state,
            };
            guard.set_producer(spawn_producer(
                agent,
                request,
                producer_tx,
                store.clone(),
                key.clone(),
            ));

            let mut translator = EventTranslator::new().with_raw_events(attach_raw_events);
            let mut failure: Option<Event> = None;

            loop {
                tokio::select! {
                    internal = producer_rx.pop() => {
                        match internal {
                            Some(Ok(agent_event)) => {
                                let translated = match &handlers.translate {
                                    Some(hook) => match hook.translate(&agent_event).await {
                                        Some(events) => events,
                                        None => translator.translate(&agent_event),
                                    },
                                    None => translator.translate(&agent_event),
                                };
                                for event in translated {
                                    consumer_tx.push(event);
                                }
                            }
                            Some(Err(e)) => {
                                warn!(session = %key, error = %e, "agent stream failed");
                                failure = Some(Event::agent_error(e.to_string()));
                                break;
                            }
                            None => break,
                        }
                    }
                    delivered = consumer_rx.pop(), if !consumer_rx.is_done() => {
                        if let Some(event) = delivered {
                            yield handlers.recorder.record_output(event).await;
                        }
                    }
                }
            }

            // Anything still open gets its END before any terminal
            // event, so pairing survives errors too.
            for event in translator.force_close() {
                consumer_tx.push(event);
            }

            if failure.is_none() {
                failure = guard.join_producer().await;
            }

            match failure {
                Some(error_event) => {
                    consumer_tx.push(error_event.with_timestamp(Event::now_millis()));
                }
                None => {
                    if snapshot_on_complete {
                        match store.get(&key).await {
                            Ok(Some(session)) => {
                                consumer_tx.push(Event::state_snapshot(session.state));
                            }
                            Ok(None) => {}
                            Err(e) => {
                                warn!(session = %key, error = %e, "failed to load final state");
                            }
                        }
                    }
                    consumer_tx.push(
                        Event::run_finished(&thread_id, &run_id, None)
                            .with_timestamp(Event::now_millis()),
                    );
                }
            }
            consumer_tx.close();

            while let Some(event) = consumer_rx.pop().await {
                yield handlers.recorder.record_output(event).await;
            }
            debug!(session = %key, run_id = %run_id, "run stream complete");
        };
        Box::pin(out)
    }
}

/// Runs the agent on its own task, persisting and forwarding each event.
/// Closes the producer queue on the way out; an error item is terminal.
fn spawn_producer(
    agent: Box<dyn Agent>,
    request: AgentRunRequest,
    tx: EventQueueSender<Result<AgentEvent, AgentError>>,
    store: Arc<dyn SessionStore>,
    key: SessionKey,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = agent.run(request);
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    if let Err(e) = store.append_events(&key, std::slice::from_ref(&event)).await
                    {
                        warn!(session = %key, error = %e, "failed to persist agent event");
                    }
                    tx.push(Ok(event));
                }
                Err(e) => {
                    tx.push(Err(e));
                    break;
                }
            }
        }
        tx.close();
    })
}

/// Scoped ownership of one run: the session lock and the producer task.
/// Dropping it aborts the producer and releases the lock.
struct RunGuard {
    handler: Arc<dyn SessionLockHandler>,
    key: SessionKey,
    producer: Option<JoinHandle<()>>,
}

impl RunGuard {
    fn new(handler: Arc<dyn SessionLockHandler>, key: SessionKey) -> Self {
        Self {
            handler,
            key,
            producer: None,
        }
    }

    fn set_producer(&mut self, handle: JoinHandle<()>) {
        self.producer = Some(handle);
    }

    /// Waits for the producer task; a panic inside it becomes a coded
    /// error event.
    async fn join_producer(&mut self) -> Option<Event> {
        let handle = self.producer.take()?;
        match handle.await {
            Ok(()) => None,
            Err(e) if e.is_panic() => {
                warn!(session = %self.key, "agent task panicked");
                Some(Event::execution_error("agent task panicked"))
            }
            Err(_) => None,
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(handle) = &self.producer {
            handle.abort();
        }
        self.handler.unlock(&self.key);
    }
}
