// crates/zipgw-nms/src/nms/states.rs

/// States of the network management state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NmState {
    /// No operation in progress. New requests are admitted.
    #[default]
    Idle,

    // --- Learn mode ---
    LearnMode,
    LearnModeStarted,
    WaitForSecureLearn,
    WaitForMdns,
    WaitForProbeBySis,
    WaitForOurProbe,

    // --- Inclusion ---
    WaitingForAdd,
    NodeFound,
    WaitForProtocol,
    PrepareSucInclusion,
    WaitForSucInclusion,
    WaitForSecureAdd,
    WaitForNeighborUpdateAfterSecureAdd,
    WaitForProbeAfterAdd,
    WaitDhcp,
    ProxyInclusionWaitNif,

    // --- SmartStart self-destruct ---
    WaitForSelfDestruct,
    WaitForTxToSelfDestruct,
    WaitForSelfDestructRemoval,
    WaitForSelfDestructRetry,
    WaitForTxToSelfDestructRetry,
    WaitForSelfDestructRemovalRetry,

    // --- Exclusion and failed nodes ---
    WaitingForNodeRemoval,
    RemovingAssociations,
    WaitingForFailNodeRemoval,
    ReplaceFailedReq,

    // --- Maintenance ---
    NetworkUpdate,
    SendingNodeInfo,
    WaitingForNodeNeighUpdate,
    WaitingForReturnRouteAssign,
    WaitingForReturnRouteDelete,
    WaitForNodeInfoProbe,
    SetDefault,
    /// Waiting for DHCP, probing and the virtual node bridge before replying.
    WaitingForProbe,
}

impl NmState {
    pub fn is_idle(&self) -> bool {
        *self == NmState::Idle
    }

    /// States that belong to the SmartStart self-destruct chain.
    pub fn is_self_destruct(&self) -> bool {
        matches!(
            self,
            NmState::WaitForSelfDestruct
                | NmState::WaitForTxToSelfDestruct
                | NmState::WaitForSelfDestructRemoval
                | NmState::WaitForSelfDestructRetry
                | NmState::WaitForTxToSelfDestructRetry
                | NmState::WaitForSelfDestructRemovalRetry
        )
    }
}
