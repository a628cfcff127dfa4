//! The key hierarchy manager: registry, wrapping, rotation, compromise

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::{HierarchyConfig, RewrapPolicy, RotationInterval};
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::hierarchy::{KeyId, KeyRecord, KeyRole, KeyState, WrapRef, WrappedMaterial};
use crate::provider::ProviderChain;
use crate::secure_memory::SecureBytes;
use crate::utils;

/// Length of generated KEK/DEK material in bytes
const KEY_MATERIAL_LEN: usize = 32;

/// Algorithm tag for AES-256-GCM wrapped symmetric keys
const SYMMETRIC_ALGORITHM_TAG: &str = "aes256-gcm";

/// Raw key material held by the manager, per generation
enum Material {
    /// Root keys are KEM key pairs; KEKs are encapsulated against the public half
    KemPair {
        public_key: Vec<u8>,
        secret_key: SecureBytes,
    },
    /// KEK and DEK material
    Symmetric(SecureBytes),
}

/// One generation: metadata record plus its in-memory material
struct Generation {
    record: KeyRecord,
    material: Material,
}

#[derive(Default)]
struct Registry {
    chains: HashMap<KeyId, Vec<Generation>>,
    root_id: Option<KeyId>,
}

impl Registry {
    fn head(&self, id: &KeyId) -> Option<&Generation> {
        self.chains.get(id).and_then(|gens| gens.last())
    }

    fn head_generation(&self, id: &KeyId) -> Option<u64> {
        self.head(id).map(|g| g.record.generation)
    }
}

/// Consistent, serializable view of every record in the hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchySnapshot {
    pub taken_at: DateTime<Utc>,
    pub records: Vec<KeyRecord>,
}

impl HierarchySnapshot {
    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// What a rotation needs from the registry before generating material
enum RotationPlan {
    Root {
        head_generation: u64,
    },
    Kek {
        head_generation: u64,
        root_id: KeyId,
        root_generation: u64,
        root_public: Vec<u8>,
    },
    Dek {
        head_generation: u64,
        kek_id: KeyId,
        kek_generation: u64,
        kek_material: Zeroizing<Vec<u8>>,
    },
}

/// Manager for the Root/KEK/DEK lifecycle.
///
/// All mutating operations use optimistic concurrency: the generation counter
/// read before computing new state must be unchanged at commit time, else the
/// operation retries with backoff up to the configured attempt budget. Reads
/// always observe a consistent snapshot, never a record mid-transition.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use qkforge::config::HierarchyConfig;
/// use qkforge::hierarchy::{KeyHierarchy, KeyState};
/// use qkforge::provider::ProviderChain;
///
/// let hierarchy = KeyHierarchy::new(
///     HierarchyConfig::default(),
///     Arc::new(ProviderChain::stub_only()),
/// ).unwrap();
/// let root = hierarchy.create_root(None).unwrap();
/// let kek = hierarchy.issue_kek().unwrap();
/// let dek = hierarchy.issue_dek(kek.id, "shard-0").unwrap();
/// assert_eq!(hierarchy.current(dek.id).unwrap().state, KeyState::Active);
/// assert_eq!(root.generation, 1);
/// ```
pub struct KeyHierarchy {
    config: HierarchyConfig,
    provider: Arc<ProviderChain>,
    registry: RwLock<Registry>,
}

impl KeyHierarchy {
    pub fn new(config: HierarchyConfig, provider: Arc<ProviderChain>) -> CryptoResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            provider,
            registry: RwLock::new(Registry::default()),
        })
    }

    fn read_registry(&self) -> CryptoResult<RwLockReadGuard<'_, Registry>> {
        self.registry.read().map_err(|_| {
            CryptoError::primitive_failure(
                "registry_lock",
                "registry lock poisoned by a panicked writer",
                error_codes::REGISTRY_POISONED,
            )
        })
    }

    fn write_registry(&self) -> CryptoResult<RwLockWriteGuard<'_, Registry>> {
        self.registry.write().map_err(|_| {
            CryptoError::primitive_failure(
                "registry_lock",
                "registry lock poisoned by a panicked writer",
                error_codes::REGISTRY_POISONED,
            )
        })
    }

    fn backoff(&self, attempt: u32) {
        let millis = 1u64 << attempt.min(5);
        std::thread::sleep(std::time::Duration::from_millis(millis));
    }

    /// Create the hierarchy's root key. Fails if a root already exists;
    /// subsequent root generations come from [`KeyHierarchy::rotate`].
    ///
    /// Optional seed material (for example an established hybrid session key)
    /// derives the root deterministically on backends that support it.
    pub fn create_root(&self, seed: Option<&[u8]>) -> CryptoResult<KeyRecord> {
        let pair = match seed {
            Some(seed) => self.provider.kem_keypair_from_seed(seed)?,
            None => self.provider.kem_keypair()?,
        };

        let mut reg = self.write_registry()?;
        if reg.root_id.is_some() {
            return Err(CryptoError::invalid_configuration(
                "root",
                "no existing root key",
                "an active root is already present",
                error_codes::ROOT_ALREADY_PRESENT,
            ));
        }
        let id = KeyId::generate();
        let record = KeyRecord {
            id,
            role: KeyRole::Root,
            algorithm_tag: pair.algorithm.clone(),
            generation: 1,
            state: KeyState::Active,
            wrapped_under: None,
            scope: None,
            created_at: Utc::now(),
            expires_at: None,
            rotating_since: None,
            usage_count: 0,
            wrap: None,
        };
        reg.chains.insert(
            id,
            vec![Generation {
                record: record.clone(),
                material: Material::KemPair {
                    public_key: pair.public_key,
                    secret_key: pair.secret_key,
                },
            }],
        );
        reg.root_id = Some(id);
        log::debug!("created root key {}", id);
        Ok(record)
    }

    /// Issue a fresh KEK wrapped under the current Active root via the
    /// provider's KEM. Fails with `PrimitiveFailure` if encapsulation fails.
    pub fn issue_kek(&self) -> CryptoResult<KeyRecord> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let (root_id, root_generation, root_public) = {
                let reg = self.read_registry()?;
                let root_id = reg
                    .root_id
                    .ok_or_else(|| CryptoError::key_not_found("root", None))?;
                let head = reg
                    .head(&root_id)
                    .ok_or_else(|| CryptoError::key_not_found(&root_id.to_string(), None))?;
                if !head.record.is_wrappable() {
                    return Err(CryptoError::dangling_wrap(
                        &root_id.to_string(),
                        head.record.generation,
                        &format!("root in state {:?} cannot serve new wraps", head.record.state),
                    ));
                }
                let public = match &head.material {
                    Material::KemPair { public_key, .. } => public_key.clone(),
                    Material::Symmetric(_) => {
                        return Err(CryptoError::primitive_failure(
                            "issue_kek",
                            "root material is not a KEM key pair",
                            error_codes::WRAP_STATE_INVALID,
                        ))
                    }
                };
                (root_id, head.record.generation, public)
            };

            let material = utils::random_bytes(KEY_MATERIAL_LEN)?;
            let id = KeyId::generate();
            let (kem_ciphertext, shared_secret) = self.provider.kem_encapsulate(&root_public)?;
            let sealed =
                self.provider
                    .aead_encrypt(shared_secret.as_bytes(), &material, &wrap_aad(&id, 1))?;

            {
                let mut reg = self.write_registry()?;
                let root_unchanged = reg
                    .head(&root_id)
                    .map(|g| g.record.generation == root_generation && g.record.is_wrappable())
                    .unwrap_or(false);
                if root_unchanged {
                    let now = Utc::now();
                    let record = KeyRecord {
                        id,
                        role: KeyRole::Kek,
                        algorithm_tag: SYMMETRIC_ALGORITHM_TAG.to_string(),
                        generation: 1,
                        state: KeyState::Active,
                        wrapped_under: Some(WrapRef {
                            key_id: root_id,
                            generation: root_generation,
                            legacy: false,
                        }),
                        scope: None,
                        created_at: now,
                        expires_at: self.config.key_lifetime.map(|lifetime| now + lifetime),
                        rotating_since: None,
                        usage_count: 0,
                        wrap: Some(WrappedMaterial {
                            kem_ciphertext: Some(kem_ciphertext),
                            sealed,
                        }),
                    };
                    reg.chains.insert(
                        id,
                        vec![Generation {
                            record: record.clone(),
                            material: Material::Symmetric(SecureBytes::new(material)),
                        }],
                    );
                    if let Some(root) = reg
                        .chains
                        .get_mut(&root_id)
                        .and_then(|gens| gens.last_mut())
                    {
                        root.record.usage_count += 1;
                    }
                    return Ok(record);
                }
            }

            if attempt >= self.config.max_rotation_attempts {
                return Err(CryptoError::rotation_failed(
                    &root_id.to_string(),
                    attempt,
                    "root rotated concurrently while issuing KEK",
                ));
            }
            self.backoff(attempt);
        }
    }

    /// Issue a fresh DEK for a shard/time-window scope, wrapped under the
    /// given KEK. A Rotating KEK still serves DEK issuance for grace-period
    /// compatibility; Retired or Compromised KEKs do not.
    pub fn issue_dek(&self, kek_id: KeyId, scope: &str) -> CryptoResult<KeyRecord> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let (kek_generation, kek_material) = {
                let reg = self.read_registry()?;
                let head = reg
                    .head(&kek_id)
                    .ok_or_else(|| CryptoError::key_not_found(&kek_id.to_string(), None))?;
                if head.record.role != KeyRole::Kek {
                    return Err(CryptoError::invalid_configuration(
                        "kek_ref",
                        "a key with the KEK role",
                        &format!("{:?}", head.record.role),
                        error_codes::WRAP_STATE_INVALID,
                    ));
                }
                if !head.record.is_live() {
                    return Err(CryptoError::dangling_wrap(
                        &kek_id.to_string(),
                        head.record.generation,
                        &format!("KEK in state {:?} cannot serve new wraps", head.record.state),
                    ));
                }
                let material = match &head.material {
                    Material::Symmetric(bytes) => Zeroizing::new(bytes.as_bytes().to_vec()),
                    Material::KemPair { .. } => {
                        return Err(CryptoError::primitive_failure(
                            "issue_dek",
                            "KEK material is not symmetric",
                            error_codes::WRAP_STATE_INVALID,
                        ))
                    }
                };
                (head.record.generation, material)
            };

            let material = utils::random_bytes(KEY_MATERIAL_LEN)?;
            let id = KeyId::generate();
            let sealed = self
                .provider
                .aead_encrypt(&kek_material, &material, &wrap_aad(&id, 1))?;

            {
                let mut reg = self.write_registry()?;
                let kek_unchanged = reg
                    .head(&kek_id)
                    .map(|g| g.record.generation == kek_generation && g.record.is_live())
                    .unwrap_or(false);
                if kek_unchanged {
                    let now = Utc::now();
                    let record = KeyRecord {
                        id,
                        role: KeyRole::Dek,
                        algorithm_tag: SYMMETRIC_ALGORITHM_TAG.to_string(),
                        generation: 1,
                        state: KeyState::Active,
                        wrapped_under: Some(WrapRef {
                            key_id: kek_id,
                            generation: kek_generation,
                            legacy: false,
                        }),
                        scope: Some(scope.to_string()),
                        created_at: now,
                        expires_at: self.config.key_lifetime.map(|lifetime| now + lifetime),
                        rotating_since: None,
                        usage_count: 0,
                        wrap: Some(WrappedMaterial {
                            kem_ciphertext: None,
                            sealed,
                        }),
                    };
                    reg.chains.insert(
                        id,
                        vec![Generation {
                            record: record.clone(),
                            material: Material::Symmetric(SecureBytes::new(material)),
                        }],
                    );
                    if let Some(kek) = reg
                        .chains
                        .get_mut(&kek_id)
                        .and_then(|gens| gens.last_mut())
                    {
                        kek.record.usage_count += 1;
                    }
                    return Ok(record);
                }
            }

            if attempt >= self.config.max_rotation_attempts {
                return Err(CryptoError::rotation_failed(
                    &kek_id.to_string(),
                    attempt,
                    "KEK changed concurrently while issuing DEK",
                ));
            }
            self.backoff(attempt);
        }
    }

    /// Rotate a key: append a new generation wrapped under the current
    /// ancestor and mark the prior generation Rotating.
    ///
    /// Rotating a root re-wraps every live KEK under the new root generation
    /// in the same logical operation; DEK wrap bytes are never touched by a
    /// root rotation. Concurrent rotations of the same id are serialized by
    /// the generation check; the retry budget comes from the config.
    pub fn rotate(&self, key_id: KeyId) -> CryptoResult<KeyRecord> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let plan = self.plan_rotation(key_id)?;

            let committed = match &plan {
                RotationPlan::Root { head_generation } => {
                    let pair = self.provider.kem_keypair()?;
                    self.commit_root_rotation(key_id, *head_generation, pair)?
                }
                RotationPlan::Kek {
                    head_generation,
                    root_id,
                    root_generation,
                    root_public,
                } => {
                    let material = utils::random_bytes(KEY_MATERIAL_LEN)?;
                    let (kem_ciphertext, shared_secret) =
                        self.provider.kem_encapsulate(root_public)?;
                    let sealed = self.provider.aead_encrypt(
                        shared_secret.as_bytes(),
                        &material,
                        &wrap_aad(&key_id, head_generation + 1),
                    )?;
                    self.commit_child_rotation(
                        key_id,
                        *head_generation,
                        (*root_id, *root_generation),
                        material,
                        WrappedMaterial {
                            kem_ciphertext: Some(kem_ciphertext),
                            sealed,
                        },
                    )?
                }
                RotationPlan::Dek {
                    head_generation,
                    kek_id,
                    kek_generation,
                    kek_material,
                } => {
                    let material = utils::random_bytes(KEY_MATERIAL_LEN)?;
                    let sealed = self.provider.aead_encrypt(
                        kek_material,
                        &material,
                        &wrap_aad(&key_id, head_generation + 1),
                    )?;
                    self.commit_child_rotation(
                        key_id,
                        *head_generation,
                        (*kek_id, *kek_generation),
                        material,
                        WrappedMaterial {
                            kem_ciphertext: None,
                            sealed,
                        },
                    )?
                }
            };

            if let Some(record) = committed {
                return Ok(record);
            }
            if attempt >= self.config.max_rotation_attempts {
                return Err(CryptoError::rotation_failed(
                    &key_id.to_string(),
                    attempt,
                    "generation changed concurrently on every attempt",
                ));
            }
            self.backoff(attempt);
        }
    }

    /// Read phase of a rotation: capture the head generation and whatever the
    /// new wrap needs from the current ancestor.
    fn plan_rotation(&self, key_id: KeyId) -> CryptoResult<RotationPlan> {
        let reg = self.read_registry()?;
        let head = reg
            .head(&key_id)
            .ok_or_else(|| CryptoError::key_not_found(&key_id.to_string(), None))?;
        let head_generation = head.record.generation;

        match head.record.role {
            KeyRole::Root => Ok(RotationPlan::Root { head_generation }),
            KeyRole::Kek => {
                let root_id = reg
                    .root_id
                    .ok_or_else(|| CryptoError::key_not_found("root", None))?;
                let root = reg
                    .head(&root_id)
                    .ok_or_else(|| CryptoError::key_not_found(&root_id.to_string(), None))?;
                if !root.record.is_wrappable() {
                    return Err(CryptoError::dangling_wrap(
                        &key_id.to_string(),
                        head_generation,
                        &format!(
                            "root {} in state {:?} cannot serve new wraps",
                            root_id, root.record.state
                        ),
                    ));
                }
                let root_public = match &root.material {
                    Material::KemPair { public_key, .. } => public_key.clone(),
                    Material::Symmetric(_) => {
                        return Err(CryptoError::primitive_failure(
                            "rotate",
                            "root material is not a KEM key pair",
                            error_codes::WRAP_STATE_INVALID,
                        ))
                    }
                };
                Ok(RotationPlan::Kek {
                    head_generation,
                    root_id,
                    root_generation: root.record.generation,
                    root_public,
                })
            }
            KeyRole::Dek => {
                let wrap_ref = head.record.wrapped_under.ok_or_else(|| {
                    CryptoError::dangling_wrap(&key_id.to_string(), head_generation, "missing")
                })?;
                let kek = reg.head(&wrap_ref.key_id).ok_or_else(|| {
                    CryptoError::dangling_wrap(
                        &key_id.to_string(),
                        head_generation,
                        &wrap_ref.to_string(),
                    )
                })?;
                if !kek.record.is_live() {
                    return Err(CryptoError::dangling_wrap(
                        &key_id.to_string(),
                        head_generation,
                        &format!(
                            "KEK {} in state {:?} cannot serve new wraps",
                            wrap_ref.key_id, kek.record.state
                        ),
                    ));
                }
                let kek_material = match &kek.material {
                    Material::Symmetric(bytes) => Zeroizing::new(bytes.as_bytes().to_vec()),
                    Material::KemPair { .. } => {
                        return Err(CryptoError::primitive_failure(
                            "rotate",
                            "KEK material is not symmetric",
                            error_codes::WRAP_STATE_INVALID,
                        ))
                    }
                };
                Ok(RotationPlan::Dek {
                    head_generation,
                    kek_id: wrap_ref.key_id,
                    kek_generation: kek.record.generation,
                    kek_material,
                })
            }
        }
    }

    /// Commit phase for root rotation. Returns `Ok(None)` on a generation
    /// conflict so the caller can retry.
    ///
    /// KEK re-wraps are computed first and applied together with the new root
    /// generation under one write guard; a provider failure leaves the
    /// registry untouched.
    fn commit_root_rotation(
        &self,
        root_id: KeyId,
        expected_generation: u64,
        pair: crate::provider::KemKeyPair,
    ) -> CryptoResult<Option<KeyRecord>> {
        let mut reg = self.write_registry()?;
        if reg.head_generation(&root_id) != Some(expected_generation) {
            return Ok(None);
        }

        let now = Utc::now();
        let new_root_generation = expected_generation + 1;

        // Pre-compute the new wraps for every live KEK before mutating anything
        let live_keks: Vec<KeyId> = reg
            .chains
            .iter()
            .filter(|(_, gens)| {
                gens.last()
                    .map(|g| g.record.role == KeyRole::Kek && g.record.is_live())
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();

        let mut rewraps = Vec::with_capacity(live_keks.len());
        for kek_id in &live_keks {
            let (kek_generation, kek_material) = match reg.head(kek_id) {
                Some(generation) => match &generation.material {
                    Material::Symmetric(bytes) => (
                        generation.record.generation,
                        Zeroizing::new(bytes.as_bytes().to_vec()),
                    ),
                    Material::KemPair { .. } => continue,
                },
                None => continue,
            };
            let (kem_ciphertext, shared_secret) =
                self.provider.kem_encapsulate(&pair.public_key)?;
            let sealed = self.provider.aead_encrypt(
                shared_secret.as_bytes(),
                &kek_material,
                &wrap_aad(kek_id, kek_generation + 1),
            )?;
            rewraps.push((
                *kek_id,
                kek_generation,
                WrappedMaterial {
                    kem_ciphertext: Some(kem_ciphertext),
                    sealed,
                },
            ));
        }

        // Append the new root generation
        let new_root_record = {
            let Some(gens) = reg.chains.get_mut(&root_id) else {
                return Ok(None);
            };
            let Some(previous) = gens.last_mut() else {
                return Ok(None);
            };
            if previous.record.state == KeyState::Active {
                previous.record.state = KeyState::Rotating;
                previous.record.rotating_since = Some(now);
            }
            let record = KeyRecord {
                id: root_id,
                role: KeyRole::Root,
                algorithm_tag: pair.algorithm.clone(),
                generation: new_root_generation,
                state: KeyState::Active,
                wrapped_under: None,
                scope: None,
                created_at: now,
                expires_at: None,
                rotating_since: None,
                usage_count: 0,
                wrap: None,
            };
            gens.push(Generation {
                record: record.clone(),
                material: Material::KemPair {
                    public_key: pair.public_key,
                    secret_key: pair.secret_key,
                },
            });
            record
        };

        // Re-wrap the KEKs: new generation, same material, new wrap bytes.
        // DEK records and their wrap bytes are untouched.
        for (kek_id, expected_kek_generation, wrap) in rewraps {
            let Some(gens) = reg.chains.get_mut(&kek_id) else {
                continue;
            };
            let Some(previous) = gens.last_mut() else {
                continue;
            };
            if previous.record.generation != expected_kek_generation {
                continue;
            }
            if previous.record.state == KeyState::Active {
                previous.record.state = KeyState::Rotating;
                previous.record.rotating_since = Some(now);
            }
            let material = match &previous.material {
                Material::Symmetric(bytes) => Material::Symmetric(bytes.clone()),
                Material::KemPair { .. } => continue,
            };
            let mut record = previous.record.clone();
            record.generation = expected_kek_generation + 1;
            record.state = KeyState::Active;
            record.wrapped_under = Some(WrapRef {
                key_id: root_id,
                generation: new_root_generation,
                legacy: false,
            });
            record.created_at = now;
            record.rotating_since = None;
            record.usage_count = 0;
            record.wrap = Some(wrap);
            gens.push(Generation { record, material });
        }

        log::debug!(
            "rotated root {} to generation {}, re-wrapped {} KEKs",
            root_id,
            new_root_generation,
            live_keks.len()
        );
        Ok(Some(new_root_record))
    }

    /// Commit phase for KEK and DEK rotations. Returns `Ok(None)` on a
    /// generation conflict (either the key itself or its ancestor moved).
    fn commit_child_rotation(
        &self,
        key_id: KeyId,
        expected_generation: u64,
        ancestor: (KeyId, u64),
        material: Vec<u8>,
        wrap: WrappedMaterial,
    ) -> CryptoResult<Option<KeyRecord>> {
        let mut reg = self.write_registry()?;
        if reg.head_generation(&key_id) != Some(expected_generation) {
            return Ok(None);
        }
        if reg.head_generation(&ancestor.0) != Some(ancestor.1) {
            return Ok(None);
        }

        let now = Utc::now();
        let Some(gens) = reg.chains.get_mut(&key_id) else {
            return Ok(None);
        };
        let Some(previous) = gens.last_mut() else {
            return Ok(None);
        };
        if previous.record.state == KeyState::Active {
            previous.record.state = KeyState::Rotating;
            previous.record.rotating_since = Some(now);
        }

        let mut record = previous.record.clone();
        record.generation = expected_generation + 1;
        record.state = KeyState::Active;
        record.wrapped_under = Some(WrapRef {
            key_id: ancestor.0,
            generation: ancestor.1,
            legacy: false,
        });
        record.created_at = now;
        record.expires_at = self.config.key_lifetime.map(|lifetime| now + lifetime);
        record.rotating_since = None;
        record.usage_count = 0;
        record.wrap = Some(wrap);

        gens.push(Generation {
            record: record.clone(),
            material: Material::Symmetric(SecureBytes::new(material)),
        });
        Ok(Some(record))
    }

    /// Flag a key Compromised and transitively mark every dependent Rotating
    /// within the same registry write, so no dependent keeps trusting a
    /// known-compromised ancestor. Returns the affected dependent ids.
    pub fn mark_compromised(&self, key_id: KeyId) -> CryptoResult<Vec<KeyId>> {
        let now = Utc::now();
        let mut reg = self.write_registry()?;

        let Some(target) = reg.chains.get_mut(&key_id) else {
            return Err(CryptoError::key_not_found(&key_id.to_string(), None));
        };
        for generation in target.iter_mut() {
            if generation.record.state != KeyState::Retired {
                generation.record.state = KeyState::Compromised;
            }
        }

        let mut affected = Vec::new();
        let mut visited: HashSet<KeyId> = HashSet::new();
        visited.insert(key_id);
        let mut frontier = vec![key_id];

        while let Some(current) = frontier.pop() {
            let dependents: Vec<KeyId> = reg
                .chains
                .iter()
                .filter(|(id, gens)| {
                    !visited.contains(*id)
                        && gens.iter().any(|g| {
                            g.record.is_live()
                                && g.record
                                    .wrapped_under
                                    .map_or(false, |w| w.key_id == current)
                        })
                })
                .map(|(id, _)| *id)
                .collect();

            for dependent in dependents {
                visited.insert(dependent);
                if let Some(gens) = reg.chains.get_mut(&dependent) {
                    for generation in gens.iter_mut() {
                        if generation.record.state == KeyState::Active {
                            generation.record.state = KeyState::Rotating;
                            generation.record.rotating_since = Some(now);
                        }
                    }
                }
                affected.push(dependent);
                frontier.push(dependent);
            }
        }

        affected.sort();
        log::warn!(
            "key {} marked compromised; {} dependents scheduled for rotation",
            key_id,
            affected.len()
        );
        Ok(affected)
    }

    /// Advance grace periods: Rotating generations past the grace window are
    /// retired, as are rotated-out roots no live record still wraps under and
    /// Compromised generations already superseded by a forced rotation.
    /// Returns the (id, generation) pairs retired.
    pub fn complete_rotations(&self, now: DateTime<Utc>) -> CryptoResult<Vec<(KeyId, u64)>> {
        let mut reg = self.write_registry()?;

        let referenced: HashSet<(KeyId, u64)> = reg
            .chains
            .values()
            .flat_map(|gens| gens.iter())
            .filter(|g| g.record.is_live())
            .filter_map(|g| g.record.wrapped_under.map(|w| (w.key_id, w.generation)))
            .collect();

        let grace = self.config.rotation_grace;
        let mut retired = Vec::new();
        for (id, gens) in reg.chains.iter_mut() {
            let head_generation = gens.last().map(|g| g.record.generation).unwrap_or(0);
            for generation in gens.iter_mut() {
                let record = &mut generation.record;
                match record.state {
                    KeyState::Rotating => {
                        let grace_elapsed = record
                            .rotating_since
                            .map_or(true, |since| since + grace <= now);
                        let unreferenced_root = record.role == KeyRole::Root
                            && !referenced.contains(&(*id, record.generation));
                        if grace_elapsed || unreferenced_root {
                            record.state = KeyState::Retired;
                            retired.push((*id, record.generation));
                        }
                    }
                    KeyState::Compromised => {
                        if record.generation < head_generation {
                            record.state = KeyState::Retired;
                            retired.push((*id, record.generation));
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(retired)
    }

    /// Keys whose current generation is due for rotation under the configured
    /// policy: expired lifetimes always count, the general rotation interval
    /// applies to every key by age or wrap count, and with a time-based
    /// re-wrap policy KEKs older than the interval count as well.
    pub fn due_for_rotation(&self, now: DateTime<Utc>) -> CryptoResult<Vec<KeyId>> {
        let reg = self.read_registry()?;
        let mut due: Vec<KeyId> = reg
            .chains
            .iter()
            .filter_map(|(id, gens)| {
                let head = gens.last()?;
                if head.record.state != KeyState::Active {
                    return None;
                }
                let expired = head.record.expires_at.map_or(false, |at| at <= now);
                let interval_due = match self.config.rotation_interval {
                    Some(RotationInterval::TimeBased(interval)) => {
                        head.record.created_at + interval <= now
                    }
                    Some(RotationInterval::UsageBased(max_wraps)) => {
                        head.record.usage_count >= max_wraps
                    }
                    None => false,
                };
                let rewrap_due = matches!(
                    self.config.rewrap_policy,
                    RewrapPolicy::TimeBased { interval }
                        if head.record.role == KeyRole::Kek
                            && head.record.created_at + interval <= now
                );
                (expired || interval_due || rewrap_due).then_some(*id)
            })
            .collect();
        due.sort();
        Ok(due)
    }

    /// Drop Retired generations from the registry. Retired history is kept
    /// until this explicit purge. Returns how many generations were removed.
    pub fn purge_retired(&self) -> CryptoResult<usize> {
        let mut reg = self.write_registry()?;
        let mut removed = 0usize;
        for gens in reg.chains.values_mut() {
            let before = gens.len();
            gens.retain(|g| g.record.state != KeyState::Retired);
            removed += before - gens.len();
        }
        reg.chains.retain(|_, gens| !gens.is_empty());
        if let Some(root_id) = reg.root_id {
            if !reg.chains.contains_key(&root_id) {
                reg.root_id = None;
            }
        }
        Ok(removed)
    }

    /// Check that a key's wrap chain resolves and authenticates.
    ///
    /// Resolves `wrapped_under` to the exact ancestor generation (which must
    /// exist and still be live), unwraps the stored wrap bytes through the
    /// provider, and compares the result against the registry material in
    /// constant time. A missing or retired ancestor surfaces as
    /// `DanglingWrap`; a tampered wrap surfaces as the provider's
    /// authentication failure. Nothing is auto-healed.
    pub fn verify_wrap(&self, key_id: KeyId) -> CryptoResult<()> {
        let reg = self.read_registry()?;
        let head = reg
            .head(&key_id)
            .ok_or_else(|| CryptoError::key_not_found(&key_id.to_string(), None))?;
        let record = &head.record;

        let Some(wrap_ref) = record.wrapped_under else {
            // Roots are unwrapped by definition
            return Ok(());
        };
        let Some(wrap) = record.wrap.as_ref() else {
            return Err(CryptoError::dangling_wrap(
                &key_id.to_string(),
                record.generation,
                "missing wrap bytes",
            ));
        };

        let ancestor = reg
            .chains
            .get(&wrap_ref.key_id)
            .and_then(|gens| {
                gens.iter()
                    .find(|g| g.record.generation == wrap_ref.generation)
            })
            .ok_or_else(|| {
                CryptoError::dangling_wrap(
                    &key_id.to_string(),
                    record.generation,
                    &wrap_ref.to_string(),
                )
            })?;
        if !ancestor.record.is_live() {
            return Err(CryptoError::dangling_wrap(
                &key_id.to_string(),
                record.generation,
                &format!("{} ({:?})", wrap_ref, ancestor.record.state),
            ));
        }

        let wrap_key: Zeroizing<Vec<u8>> = match (&ancestor.material, &wrap.kem_ciphertext) {
            (Material::KemPair { secret_key, .. }, Some(kem_ciphertext)) => {
                let shared_secret = self
                    .provider
                    .kem_decapsulate(secret_key.as_bytes(), kem_ciphertext)?;
                Zeroizing::new(shared_secret.as_bytes().to_vec())
            }
            (Material::Symmetric(bytes), None) => Zeroizing::new(bytes.as_bytes().to_vec()),
            _ => {
                return Err(CryptoError::primitive_failure(
                    "verify_wrap",
                    "wrap shape does not match ancestor material",
                    error_codes::WRAP_STATE_INVALID,
                ))
            }
        };

        let opened = Zeroizing::new(self.provider.aead_decrypt(
            &wrap_key,
            &wrap.sealed,
            &wrap_aad(&key_id, record.generation),
        )?);
        match &head.material {
            Material::Symmetric(stored) if stored.ct_eq(&opened) => Ok(()),
            _ => Err(CryptoError::primitive_failure(
                "verify_wrap",
                "unwrapped material does not match the registry",
                error_codes::WRAP_STATE_INVALID,
            )),
        }
    }

    /// Current (newest) generation record for a key id
    pub fn current(&self, key_id: KeyId) -> CryptoResult<KeyRecord> {
        let reg = self.read_registry()?;
        reg.head(&key_id)
            .map(|g| g.record.clone())
            .ok_or_else(|| CryptoError::key_not_found(&key_id.to_string(), None))
    }

    /// A specific generation record for a key id
    pub fn record(&self, key_id: KeyId, generation: u64) -> CryptoResult<KeyRecord> {
        let reg = self.read_registry()?;
        reg.chains
            .get(&key_id)
            .and_then(|gens| {
                gens.iter()
                    .find(|g| g.record.generation == generation)
                    .map(|g| g.record.clone())
            })
            .ok_or_else(|| CryptoError::key_not_found(&key_id.to_string(), Some(generation)))
    }

    /// Consistent snapshot of every record, sorted by id then generation
    pub fn snapshot(&self) -> CryptoResult<HierarchySnapshot> {
        let reg = self.read_registry()?;
        let mut records: Vec<KeyRecord> = reg
            .chains
            .values()
            .flat_map(|gens| gens.iter().map(|g| g.record.clone()))
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id).then(a.generation.cmp(&b.generation)));
        Ok(HierarchySnapshot {
            taken_at: Utc::now(),
            records,
        })
    }
}

/// Associated data binding a wrap to its record identity
fn wrap_aad(key_id: &KeyId, generation: u64) -> Vec<u8> {
    format!("qkforge/wrap/{}/{}", key_id, generation).into_bytes()
}
