// crates/zipgw-nms/tests/simulator/mod.rs
#![allow(dead_code)]

pub mod mocks;

pub use mocks::{
    GATEWAY_NODE, SimDirectory, SimHost, SimProvisioning, SimRadio, SimSecurity, SimTransport,
};

use zipgw_nms::hal::ZipAck;
use zipgw_nms::{HandlerOutcome, NetworkManagement, NmEvent, NmState, NmsConfig, NmsEnv, Peer};

/// A gateway with a network management instance, its collaborators and a
/// virtual clock.
pub struct Gateway {
    pub nms: NetworkManagement,
    pub now_ms: u64,
    pub radio: SimRadio,
    pub security: SimSecurity,
    pub directory: SimDirectory,
    pub provisioning: SimProvisioning,
    pub transport: SimTransport,
    pub host: SimHost,
}

impl Gateway {
    pub fn new(config: NmsConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            nms: NetworkManagement::new(config),
            now_ms: 0,
            radio: SimRadio::default(),
            security: SimSecurity::default(),
            directory: SimDirectory::default(),
            provisioning: SimProvisioning::default(),
            transport: SimTransport::default(),
            host: SimHost::default(),
        }
    }

    /// A gateway without SmartStart, so add mode is only touched by the
    /// scenario itself.
    pub fn without_smart_start() -> Self {
        let config = NmsConfig {
            smart_start_enabled: false,
            ..Default::default()
        };
        Self::new(config)
    }

    /// Splits the gateway into the state machine and its environment.
    pub fn parts(&mut self) -> (&mut NetworkManagement, NmsEnv<'_>) {
        let env = NmsEnv {
            now_ms: self.now_ms,
            radio: &mut self.radio,
            security: &mut self.security,
            directory: &mut self.directory,
            provisioning: &self.provisioning,
            transport: &mut self.transport,
            host: &mut self.host,
        };
        (&mut self.nms, env)
    }

    /// Runs `f` against the state machine with a fresh environment.
    pub fn with<R>(&mut self, f: impl FnOnce(&mut NetworkManagement, &mut NmsEnv<'_>) -> R) -> R {
        let (nms, mut env) = self.parts();
        f(nms, &mut env)
    }

    pub fn request(&mut self, peer: Peer, frame: &[u8]) -> HandlerOutcome {
        self.with(|nms, env| nms.handle_command(env, peer, frame))
    }

    pub fn post(&mut self, event: NmEvent) {
        self.with(|nms, env| nms.post_event(env, event));
    }

    /// Moves the clock forward and processes every deadline on the way.
    pub fn advance(&mut self, ms: u64) {
        let target = self.now_ms + ms;
        while let Some(deadline) = self.nms.next_deadline() {
            if deadline > target {
                break;
            }
            self.now_ms = self.now_ms.max(deadline);
            self.with(|nms, env| nms.tick(env));
        }
        self.now_ms = target;
        self.with(|nms, env| nms.tick(env));
    }

    pub fn state(&self) -> NmState {
        self.nms.state()
    }

    /// Frames sent to `peer`, oldest first.
    pub fn frames_to(&self, peer: &Peer) -> Vec<Vec<u8>> {
        self.transport
            .sent
            .iter()
            .filter(|(to, _)| to.same_endpoint(peer))
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    pub fn last_frame(&self) -> Option<&[u8]> {
        self.transport.sent.last().map(|(_, f)| f.as_slice())
    }

    pub fn acks_to(&self, peer: &Peer) -> Vec<ZipAck> {
        self.transport
            .acks
            .iter()
            .filter(|(to, _)| to.same_endpoint(peer))
            .map(|(_, ack)| *ack)
            .collect()
    }
}

pub fn client(port: u16) -> Peer {
    Peer::new(format!("192.168.1.20:{port}").parse().unwrap(), false)
}
