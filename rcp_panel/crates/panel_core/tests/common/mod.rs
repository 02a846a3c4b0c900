#![allow(dead_code)]
//! Scripted client and helpers for driving the controller without a socket.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use panel_core::{
    ClientEvent, Clock, ConnectionController, Flush, ManualClock, NumberDefinition, PanelConfig,
    ParamKind, Parameter, ParameterRef, RemoteClient, SessionConfig,
};

#[derive(Default)]
pub struct ClientLog {
    pub config: SessionConfig,
    pub connects: Vec<(String, u16)>,
    pub disposes: usize,
    pub updates: usize,
    pub pending: VecDeque<ClientEvent>,
}

pub type SharedLog = Rc<RefCell<ClientLog>>;

pub struct ScriptedClient {
    log: SharedLog,
}

impl RemoteClient for ScriptedClient {
    fn connect(&mut self, host: &str, port: u16) {
        self.log.borrow_mut().connects.push((host.to_string(), port));
    }

    fn dispose(&mut self) {
        self.log.borrow_mut().disposes += 1;
    }

    fn update(&mut self) {
        self.log.borrow_mut().updates += 1;
    }

    fn poll_events(&mut self) -> Vec<ClientEvent> {
        self.log.borrow_mut().pending.drain(..).collect()
    }
}

pub struct Harness {
    pub controller: ConnectionController,
    pub clock: ManualClock,
    pub sessions: Rc<RefCell<Vec<SharedLog>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PanelConfig::default())
    }

    pub fn with_config(config: PanelConfig) -> Self {
        let clock = ManualClock::new();
        let sessions: Rc<RefCell<Vec<SharedLog>>> = Rc::new(RefCell::new(Vec::new()));
        let factory = {
            let sessions = Rc::clone(&sessions);
            move |cfg: &SessionConfig| -> Box<dyn RemoteClient> {
                let log = Rc::new(RefCell::new(ClientLog {
                    config: *cfg,
                    ..ClientLog::default()
                }));
                sessions.borrow_mut().push(Rc::clone(&log));
                Box::new(ScriptedClient { log })
            }
        };
        let clock_handle: Rc<dyn Clock> = Rc::new(clock.clone());
        let controller = ConnectionController::new(&config, Box::new(factory), clock_handle);
        Self {
            controller,
            clock,
            sessions,
        }
    }

    /// Connects to localhost:10000 and acknowledges.
    pub fn connected() -> Self {
        let mut h = Self::new();
        h.controller.connect("localhost", 10000);
        h.deliver(ClientEvent::Connected);
        h
    }

    pub fn session(&self, index: usize) -> SharedLog {
        Rc::clone(&self.sessions.borrow()[index])
    }

    pub fn current(&self) -> SharedLog {
        let sessions = self.sessions.borrow();
        Rc::clone(sessions.last().expect("no session was created"))
    }

    /// Queues an event on the current session without polling.
    pub fn push(&self, event: ClientEvent) {
        self.current().borrow_mut().pending.push_back(event);
    }

    /// Queues an event and polls once.
    pub fn deliver(&mut self, event: ClientEvent) -> bool {
        self.push(event);
        self.controller.poll()
    }

    pub fn advance_ms(&mut self, ms: u64) -> bool {
        self.clock.advance_ms(ms);
        self.controller.poll()
    }

    pub fn published_ids(&self) -> Vec<i32> {
        self.controller.parameters().iter().map(|p| p.id().0).collect()
    }
}

#[derive(Default)]
pub struct CountingFlush {
    pub flushes: usize,
}

impl Flush for CountingFlush {
    fn flush(&mut self) {
        self.flushes += 1;
    }
}

pub fn text(id: i32, label: &str) -> ParameterRef {
    Parameter::labeled(id, ParamKind::Text, label)
}

pub fn number(id: i32, label: &str, value: f64) -> ParameterRef {
    let p = Parameter::labeled(id, ParamKind::Number(NumberDefinition::float()), label);
    p.set_value(panel_core::Value::Number(value));
    p
}

pub fn bounded(id: i32, label: &str, value: f64, min: f64, max: f64) -> ParameterRef {
    let def = NumberDefinition::float().with_range(min, max);
    let p = Parameter::labeled(id, ParamKind::Number(def), label);
    p.set_value(panel_core::Value::Number(value));
    p
}

pub fn trigger(id: i32, label: &str) -> ParameterRef {
    Parameter::labeled(id, ParamKind::Trigger, label)
}

pub fn group(id: i32, label: &str, children: Vec<ParameterRef>) -> ParameterRef {
    let g = Parameter::labeled(id, ParamKind::Group, label);
    for child in children {
        g.add_child(child);
    }
    g
}
