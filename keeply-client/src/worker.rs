//! Background KEM worker.
//!
//! Keygen, encapsulation and decapsulation are expensive; they run on a
//! dedicated task so callers never block on them. Communication is
//! message-passing: each request carries a correlation id and a reply
//! channel, with no ordering guarantee across concurrent requests. The
//! worker is also the only holder of the identity secret key — clearing
//! it on sign-out makes every later request fail closed instead of
//! returning stale key material.

use crate::error::{ClientError, ClientResult};
use keeply_crypto::{encapsulate, IdentityKeyPair, KemCiphertext, PublicKey, Seed, SymmetricKey};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Commands processed by the KEM worker.
enum KemCommand {
    /// Derive and hold the identity keypair; replies with the public key.
    Keygen {
        id: u64,
        seed: Seed,
        reply: oneshot::Sender<ClientResult<PublicKey>>,
    },
    /// Encapsulate a fresh shared secret under an arbitrary public key.
    Encapsulate {
        id: u64,
        public_key: PublicKey,
        reply: oneshot::Sender<ClientResult<(SymmetricKey, KemCiphertext)>>,
    },
    /// Decapsulate with the held identity secret key.
    Decapsulate {
        id: u64,
        ciphertext: KemCiphertext,
        reply: oneshot::Sender<ClientResult<SymmetricKey>>,
    },
    /// Drop the held identity keypair (sign-out).
    Clear {
        id: u64,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    /// Stop the worker loop. Queued and subsequent requests fail with
    /// [`ClientError::WorkerClosed`].
    Shutdown {
        id: u64,
        reply: oneshot::Sender<ClientResult<()>>,
    },
}

/// Handle to the KEM worker. Cheap to clone.
#[derive(Clone)]
pub struct KemWorkerHandle {
    command_tx: mpsc::Sender<KemCommand>,
    next_id: Arc<AtomicU64>,
}

/// Spawns the KEM worker task and returns its handle.
pub fn spawn_kem_worker() -> KemWorkerHandle {
    let (command_tx, mut command_rx) = mpsc::channel::<KemCommand>(64);

    tokio::spawn(async move {
        // The identity keypair never leaves this task.
        let mut identity: Option<IdentityKeyPair> = None;

        while let Some(command) = command_rx.recv().await {
            match command {
                KemCommand::Keygen { id, seed, reply } => {
                    debug!(request_id = id, "kem worker: keygen");
                    let keypair = IdentityKeyPair::from_seed(&seed);
                    let public = keypair.public_key();
                    identity = Some(keypair);
                    let _ = reply.send(Ok(public));
                }
                KemCommand::Encapsulate {
                    id,
                    public_key,
                    reply,
                } => {
                    debug!(request_id = id, "kem worker: encapsulate");
                    let result = encapsulate(&public_key).map_err(ClientError::from);
                    let _ = reply.send(result);
                }
                KemCommand::Decapsulate {
                    id,
                    ciphertext,
                    reply,
                } => {
                    debug!(request_id = id, "kem worker: decapsulate");
                    let result = match identity.as_ref() {
                        Some(keypair) => {
                            keypair.decapsulate(&ciphertext).map_err(ClientError::from)
                        }
                        None => Err(ClientError::Locked),
                    };
                    let _ = reply.send(result);
                }
                KemCommand::Clear { id, reply } => {
                    debug!(request_id = id, "kem worker: clear identity");
                    identity = None;
                    let _ = reply.send(Ok(()));
                }
                KemCommand::Shutdown { id, reply } => {
                    debug!(request_id = id, "kem worker: shutting down");
                    let _ = reply.send(Ok(()));
                    // Dropping the receiver fails queued requests; the
                    // identity drops with the task.
                    break;
                }
            }
        }
    });

    KemWorkerHandle {
        command_tx,
        next_id: Arc::new(AtomicU64::new(1)),
    }
}

impl KemWorkerHandle {
    fn correlation_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request<T>(
        &self,
        command: KemCommand,
        reply_rx: oneshot::Receiver<ClientResult<T>>,
    ) -> ClientResult<T> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ClientError::WorkerClosed)?;
        reply_rx.await.map_err(|_| ClientError::WorkerClosed)?
    }

    /// Derives the identity keypair from a seed; the worker holds the
    /// secret half and replies with the public key.
    pub async fn keygen(&self, seed: Seed) -> ClientResult<PublicKey> {
        let (reply, reply_rx) = oneshot::channel();
        let id = self.correlation_id();
        self.request(KemCommand::Keygen { id, seed, reply }, reply_rx)
            .await
    }

    /// Encapsulates a fresh shared secret under `public_key`.
    pub async fn encapsulate(
        &self,
        public_key: PublicKey,
    ) -> ClientResult<(SymmetricKey, KemCiphertext)> {
        let (reply, reply_rx) = oneshot::channel();
        let id = self.correlation_id();
        self.request(
            KemCommand::Encapsulate {
                id,
                public_key,
                reply,
            },
            reply_rx,
        )
        .await
    }

    /// Recovers a shared secret with the held identity secret key.
    /// Fails with [`ClientError::Locked`] after sign-out.
    pub async fn decapsulate(&self, ciphertext: KemCiphertext) -> ClientResult<SymmetricKey> {
        let (reply, reply_rx) = oneshot::channel();
        let id = self.correlation_id();
        self.request(
            KemCommand::Decapsulate {
                id,
                ciphertext,
                reply,
            },
            reply_rx,
        )
        .await
    }

    /// Drops the held identity keypair.
    pub async fn clear(&self) -> ClientResult<()> {
        let (reply, reply_rx) = oneshot::channel();
        let id = self.correlation_id();
        self.request(KemCommand::Clear { id, reply }, reply_rx)
            .await
    }

    /// Stops the worker. Every request after this (from any handle clone)
    /// fails with [`ClientError::WorkerClosed`].
    pub async fn shutdown(&self) -> ClientResult<()> {
        let (reply, reply_rx) = oneshot::channel();
        let id = self.correlation_id();
        self.request(KemCommand::Shutdown { id, reply }, reply_rx)
            .await
    }
}
