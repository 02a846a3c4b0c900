use crate::device::{demo, ParamStore};
use crate::protocol::{
    datatype, ClientCommand, ErrorCode, InboundMsg, OutboundMsg, ParamDescriptor, ParamUpdate,
    ServerMessage,
};
use crate::validator;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use serde_json::Value;
use tracing::{debug, info, warn};

pub struct MainLoop {
    inbound_rx: Receiver<InboundMsg>,
    outbound_tx: Sender<OutboundMsg>,
    store: ParamStore,
    client_connected: bool,
}

impl MainLoop {
    pub fn new(inbound_rx: Receiver<InboundMsg>, outbound_tx: Sender<OutboundMsg>) -> Self {
        Self::with_store(inbound_rx, outbound_tx, ParamStore::demo())
    }

    pub fn with_store(
        inbound_rx: Receiver<InboundMsg>,
        outbound_tx: Sender<OutboundMsg>,
        store: ParamStore,
    ) -> Self {
        Self {
            inbound_rx,
            outbound_tx,
            store,
            client_connected: false,
        }
    }

    pub fn store(&self) -> &ParamStore {
        &self.store
    }

    pub fn client_connected(&self) -> bool {
        self.client_connected
    }

    /// Handles everything the network thread queued since the last call.
    pub fn tick(&mut self) {
        loop {
            match self.inbound_rx.try_recv() {
                Ok(InboundMsg::ClientConnected { socket_addr }) => {
                    debug!(%socket_addr, "panel attached");
                    self.client_connected = true;
                }
                Ok(InboundMsg::ClientDisconnected) => {
                    debug!("panel detached");
                    self.client_connected = false;
                }
                Ok(InboundMsg::Command { cmd }) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::Init => {
                info!(count = self.store.len(), "sending parameter tree");
                let added: Vec<ServerMessage> = self
                    .store
                    .descriptors()
                    .iter()
                    .map(|param| ServerMessage::ParamAdded {
                        param: param.clone(),
                    })
                    .collect();
                for msg in added {
                    self.send(msg);
                }
            }
            ClientCommand::Update { param } => {
                if param.label.is_some() || param.description.is_some() || param.readonly.is_some()
                {
                    debug!(id = param.id, "ignoring metadata change from panel");
                }
                self.write_value(param.id, param.value);
            }
            ClientCommand::UpdateValue { id, value } => {
                let value = (!value.is_null()).then_some(value);
                self.write_value(id, value);
            }
        }
    }

    fn write_value(&mut self, id: i32, value: Option<Value>) {
        let Some(desc) = self.store.get(id) else {
            self.send_error(ErrorCode::UnknownParam, format!("unknown parameter {id}"));
            return;
        };

        if desc.datatype == datatype::BANG {
            if desc.readonly {
                self.send_error(ErrorCode::Readonly, format!("parameter {id} is readonly"));
                return;
            }
            self.fire(id);
            return;
        }

        let Some(value) = value else {
            self.send_error(ErrorCode::InvalidValue, format!("no value for parameter {id}"));
            self.resend_value(id);
            return;
        };

        match validator::validate_value(desc, &value) {
            Ok(value) => {
                self.store.set_value(id, value.clone());
                self.send(ServerMessage::ParamUpdated {
                    update: ParamUpdate::value(id, value),
                });
            }
            Err(rejection) => {
                warn!(id, code = ?rejection.code, msg = %rejection.msg, "value refused");
                self.send_error(rejection.code, rejection.msg);
                self.resend_value(id);
            }
        }
    }

    /// Pushes the stored value after a refusal so the client drops whatever
    /// it accepted locally.
    fn resend_value(&mut self, id: i32) {
        let Some(value) = self.store.get(id).and_then(|d| d.value.clone()) else {
            return;
        };
        self.send(ServerMessage::ParamUpdated {
            update: ParamUpdate::value(id, value),
        });
    }

    fn fire(&mut self, id: i32) {
        info!(id, "trigger fired");
        if id == demo::RESET {
            for update in self.store.reset() {
                self.send(ServerMessage::ParamUpdated { update });
            }
        }
    }

    /// Adds a parameter to the live tree and announces it.
    pub fn add_param(&mut self, desc: ParamDescriptor) {
        self.store.insert(desc.clone());
        self.send(ServerMessage::ParamAdded { param: desc });
    }

    /// Removes a parameter subtree and announces the removal of its top.
    pub fn remove_param(&mut self, id: i32) {
        let removed = self.store.remove(id);
        if removed.is_empty() {
            debug!(id, "nothing to remove");
            return;
        }
        self.send(ServerMessage::ParamRemoved { id });
    }

    /// Changes a value on the device side, as a knob turned on the hardware would.
    pub fn set_value(&mut self, id: i32, value: Value) {
        if self.store.set_value(id, value.clone()) {
            self.send(ServerMessage::ParamUpdated {
                update: ParamUpdate::value(id, value),
            });
        }
    }

    /// Asks the network thread to close the current panel connection.
    pub fn close_client(&mut self, code: u16, reason: &str) {
        let _ = self.outbound_tx.try_send(OutboundMsg::Close {
            code,
            reason: reason.to_string(),
        });
    }

    fn send_error(&mut self, code: ErrorCode, msg: String) {
        self.send(ServerMessage::Error { msg, code });
    }

    fn send(&mut self, msg: ServerMessage) {
        if !self.client_connected {
            return;
        }
        if self.outbound_tx.try_send(OutboundMsg::Send { msg }).is_err() {
            warn!("outbound queue full, dropping message");
        }
    }
}
