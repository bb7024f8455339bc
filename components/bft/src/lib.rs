//! This crate contains the consensus component: the replica state machine of
//! the chained HotStuff protocol. Each block carries a quorum certificate for
//! its predecessor, and a block is decided once it heads a chain of three
//! blocks linked by direct parent edges.
//!
//! Transport, signatures, command batching, command execution and the
//! pacemaker's timeout schedule are external collaborators: the first is
//! reached through the input/output message channels, the rest through the
//! capability traits below.
use std::sync::Arc;

pub use config::Config;
use hotstuff_roles::replica;
use zksync_concurrency::{
    ctx,
    error::Wrap as _,
    scope,
    sync::{self, prunable_mpsc::SelectionFunctionResult},
};

mod chained;
mod config;
mod io;
mod metrics;
pub mod testonly;
#[cfg(test)]
mod tests;
mod vote_pool;

pub use io::{InputMessage, OutputMessage};

/// Vote signing and certificate aggregation trait.
#[async_trait::async_trait]
pub trait Signer: std::fmt::Debug + Send + Sync {
    /// Signs a vote for the given block on behalf of this replica.
    async fn create_partial_cert(
        &self,
        ctx: &ctx::Ctx,
        block: &replica::Block,
    ) -> ctx::Result<replica::PartialCert>;

    /// Combines a quorum of partial certificates for `block` into a quorum
    /// certificate.
    async fn create_quorum_cert(
        &self,
        ctx: &ctx::Ctx,
        block: &replica::Block,
        certs: &[replica::PartialCert],
    ) -> ctx::Result<replica::QuorumCert>;
}

/// Certificate verification trait. Certificates are verifiable independently
/// of any chain state.
#[async_trait::async_trait]
pub trait Verifier: std::fmt::Debug + Send + Sync {
    /// Whether the partial certificate carries a valid signature from its
    /// signer.
    async fn verify_partial_cert(
        &self,
        ctx: &ctx::Ctx,
        cert: &replica::PartialCert,
    ) -> ctx::Result<bool>;

    /// Whether the quorum certificate is valid: a quorum of distinct signers
    /// and valid aggregated signature material.
    async fn verify_quorum_cert(
        &self,
        ctx: &ctx::Ctx,
        qc: &replica::QuorumCert,
    ) -> ctx::Result<bool>;
}

/// Source of commands to propose. Batching commands from clients is up to the
/// application.
#[async_trait::async_trait]
pub trait CommandQueue: std::fmt::Debug + Send + Sync {
    /// The next command to propose, if any.
    async fn get_command(&self, ctx: &ctx::Ctx) -> ctx::Result<Option<replica::Command>>;
}

/// Admission filter for proposed commands (replay and validity checks).
#[async_trait::async_trait]
pub trait Acceptor: std::fmt::Debug + Send + Sync {
    /// Whether the command of an incoming proposal may be voted for.
    async fn accept(&self, ctx: &ctx::Ctx, command: &replica::Command) -> ctx::Result<bool>;
}

/// Application-side command execution.
#[async_trait::async_trait]
pub trait Executor: std::fmt::Debug + Send + Sync {
    /// Applies a decided command to the application state machine. Commands
    /// are executed at most once, in ascending view order of their blocks.
    async fn exec(&self, ctx: &ctx::Ctx, command: &replica::Command) -> ctx::Result<()>;
}

/// Leader rotation policy.
pub trait LeaderRotation: std::fmt::Debug + Send + Sync {
    /// The leader of the given view.
    fn get_leader(&self, view: replica::ViewNumber) -> replica::ReplicaId;
}

impl Config {
    /// Starts the consensus component. It will run until the context is
    /// canceled, processing messages from `inbound_channel`, pushing network
    /// intents into `outbound_channel` and publishing every newly observed
    /// quorum certificate to `sync_info_sender` for the view synchronizer.
    pub async fn run(
        self,
        ctx: &ctx::Ctx,
        outbound_channel: ctx::channel::UnboundedSender<OutputMessage>,
        inbound_channel: sync::prunable_mpsc::Receiver<InputMessage>,
        sync_info_sender: sync::watch::Sender<Option<replica::SyncInfo>>,
    ) -> anyhow::Result<()> {
        let cfg = Arc::new(self);
        let replica = chained::StateMachine::start(
            ctx,
            cfg.clone(),
            outbound_channel,
            inbound_channel,
            sync_info_sender,
        )
        .await
        .wrap("StateMachine::start()")?;

        let res = scope::run!(ctx, |ctx, s| async {
            tracing::info!(
                "Starting consensus component. Replica id: {}.",
                cfg.replica_id
            );
            s.spawn(async { replica.run(ctx).await.wrap("replica.run()") });
            Ok(())
        })
        .await;
        match res {
            Ok(()) | Err(ctx::Error::Canceled(_)) => Ok(()),
            Err(ctx::Error::Internal(err)) => Err(err),
        }
    }
}

/// Creates a new input channel for the consensus component.
pub fn create_input_channel() -> (
    sync::prunable_mpsc::Sender<InputMessage>,
    sync::prunable_mpsc::Receiver<InputMessage>,
) {
    sync::prunable_mpsc::channel(inbound_filter_predicate, inbound_selection_function)
}

/// Filter predicate for incoming messages. Proposals received from the
/// network must carry a justification; only locally-created dummy blocks and
/// genesis lack one.
fn inbound_filter_predicate(new: &InputMessage) -> bool {
    !matches!(new, InputMessage::Proposal(block) if block.justification.is_none())
}

/// Selection function for incoming messages: a vote that duplicates a queued
/// vote from the same signer for the same block is discarded before it
/// reaches the state machine.
fn inbound_selection_function(
    old: &InputMessage,
    new: &InputMessage,
) -> SelectionFunctionResult {
    match (old, new) {
        (InputMessage::Vote(old), InputMessage::Vote(new))
            if old.signer == new.signer && old.block_hash == new.block_hash =>
        {
            SelectionFunctionResult::DiscardNew
        }
        _ => SelectionFunctionResult::Keep,
    }
}
