/*!
 * Key Hierarchy Management
 *
 * Owns the in-memory registry of root keys, key-encryption keys (KEKs), and
 * data-encryption keys (DEKs) and drives their lifecycle: creation, rotation,
 * re-wrapping, and compromise handling.
 *
 * The hierarchy is a directed acyclic graph addressed by (id, generation):
 * every record is immutable in its wrap data once created, and "mutation"
 * means appending a new generation. Rotation re-wraps key material only;
 * bulk ciphertext encrypted under a DEK is never touched, which is what makes
 * algorithm and parameter changes cheap (crypto-agility).
 */

mod manager;
mod record;


pub use manager::{HierarchySnapshot, KeyHierarchy};
pub use record::{KeyId, KeyRecord, KeyRole, KeyState, WrapRef, WrappedMaterial};
