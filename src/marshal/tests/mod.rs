//! Tests for the boundary marshaller
//!
//! Organized by direction and by box type

mod helpers;
