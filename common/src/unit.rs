//! Marker types.

/// Marker type describing an entity creation.
#[derive(Clone, Copy, Debug)]
pub struct Creation;

/// Marker type describing an entity reaching its final state.
#[derive(Clone, Copy, Debug)]
pub struct Resolution;
