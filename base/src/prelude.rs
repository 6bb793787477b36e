//! The prelude exports the structs and functions which are useful in
//! representing things to do with the B5500.  Providing this prelude
//! is the main purpose of the base crate.
pub use super::cw::{Descriptor, Incw, Lcw, Mscw, Pointer, Rcw};
pub use super::syllable::{
    char_field, pack_syllables, syllable_of, CharOp, WordOp, WordSyllable, SYLLABLE_MASK,
};
pub use super::word::*;
