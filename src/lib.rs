//! # Famille Photo
//!
//! The profile-photo pipeline of a family-organization app: a user picks an
//! image, positions a crop frame, and the result ends up as the photo of
//! their profile or of a family member.
//!
//! # Architecture: One Session, Six Stages
//!
//! ```text
//! 1. Load       SelectedFile   →  SourceImage     (validate image/*, identify)
//! 2. Edit       SourceImage    →  PixelRect       (crop editor state machine)
//! 3. Extract    PixelRect      →  ExtractedBlob   (copy at selection size)
//! 4. Optimize   ExtractedBlob  →  OptimizedAsset  (bound + re-encode, best-effort)
//! 5. Upload     OptimizedAsset →  RemoteAsset     (object store, timestamped key)
//! 6. Sync       RemoteAsset    →  record update   (document store, then identity)
//! ```
//!
//! Stages run strictly in order inside a [`session::PhotoSession`]. A stage
//! never starts before the previous one produced its value, and the entity
//! record is written only after the upload returned a URL.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`loader`] | Stage 1: MIME check, dimension probe, preview registration |
//! | [`editor`] | Stage 2: crop state machine with aspect, bounds and zoom invariants |
//! | [`imaging`] | Stages 3 and 4: geometry, backend trait, `image`-crate backend |
//! | [`upload`] | Stage 5: object keys and the upload call |
//! | [`sync`] | Stage 6: primary record write, best-effort identity write |
//! | [`session`] | Session lock, stage ordering, notifications, orphan compensation |
//! | [`store`] | Collaborator traits with in-memory and filesystem implementations |
//! | [`notify`] | Publish/subscribe notification bus (`status`, `photoStatus`) |
//! | [`preview`] | `blob:` preview handles released with their owner |
//! | [`gc`] | Sweep for stored photos no record references |
//! | [`config`] | `config.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Optimization Never Fails the Upload
//!
//! If re-encoding fails, the unoptimized crop is uploaded instead and the
//! failure is logged. A user can always set a photo, even a large one.
//!
//! ## Document Store First
//!
//! The document store is the source of truth for display. Its write must
//! succeed; the identity provider's photo field is updated afterwards on a
//! best-effort basis and a failure there is only logged.
//!
//! ## Optimistic Concurrency
//!
//! A session remembers the record's etag when it opens. If another device
//! changed the record before the session finishes, the write is refused
//! instead of silently overwriting the newer photo.
//!
//! ## No Orphans
//!
//! When the record write fails after the upload succeeded, the uploaded
//! object is deleted again. Whatever slips through (a crash between the two
//! writes, photos replaced by newer uploads) is removed by [`gc`].

pub mod config;
pub mod editor;
pub mod error;
pub mod gc;
pub mod imaging;
pub mod loader;
pub mod notify;
pub mod output;
pub mod preview;
pub mod session;
pub mod store;
pub mod sync;
pub mod types;
pub mod upload;

pub use error::PipelineError;

#[cfg(test)]
pub(crate) mod test_helpers;
