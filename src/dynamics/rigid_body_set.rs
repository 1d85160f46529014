use crate::dynamics::RigidBody;
use std::ops::{Index, IndexMut};

/// The unique handle of a rigid body added to a `RigidBodySet`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct RigidBodyHandle(pub(crate) u32);

impl RigidBodyHandle {
    /// Converts this handle into its raw index.
    pub fn into_raw_parts(self) -> u32 {
        self.0
    }

    /// Reconstructs an handle from its raw index.
    pub fn from_raw_parts(id: u32) -> Self {
        Self(id)
    }

    /// An always-invalid rigid-body handle.
    pub fn invalid() -> Self {
        Self(u32::MAX)
    }
}

#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Default, Debug)]
/// A set of rigid bodies that can be handled by the joint solver.
///
/// Bodies cannot be removed, so a handle returned by `insert` stays valid for the whole
/// life of the set.
pub struct RigidBodySet {
    bodies: Vec<RigidBody>,
}

impl RigidBodySet {
    /// Create a new empty set of rigid bodies.
    pub fn new() -> Self {
        RigidBodySet { bodies: Vec::new() }
    }

    /// The number of rigid bodies on this set.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// `true` if there are no rigid bodies in this set.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Is the given body handle valid?
    pub fn contains(&self, handle: RigidBodyHandle) -> bool {
        (handle.0 as usize) < self.bodies.len()
    }

    /// Insert a rigid body into this set and retrieve its handle.
    pub fn insert(&mut self, rb: impl Into<RigidBody>) -> RigidBodyHandle {
        let handle = RigidBodyHandle(self.bodies.len() as u32);
        self.bodies.push(rb.into());
        handle
    }

    /// Gets the rigid-body with the given handle.
    pub fn get(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.0 as usize)
    }

    /// Gets a mutable reference to the rigid-body with the given handle.
    pub fn get_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle.0 as usize)
    }

    /// Wakes up the rigid-body with the given handle, if it exists.
    pub fn wake_up(&mut self, handle: RigidBodyHandle) {
        if let Some(rb) = self.get_mut(handle) {
            rb.wake_up();
        }
    }

    /// Iterates through all the rigid-bodies on this set, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (RigidBodyHandle, &RigidBody)> {
        self.bodies
            .iter()
            .enumerate()
            .map(|(i, rb)| (RigidBodyHandle(i as u32), rb))
    }

    /// Iterates mutably through all the rigid-bodies on this set, in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (RigidBodyHandle, &mut RigidBody)> {
        self.bodies
            .iter_mut()
            .enumerate()
            .map(|(i, rb)| (RigidBodyHandle(i as u32), rb))
    }
}

impl Index<RigidBodyHandle> for RigidBodySet {
    type Output = RigidBody;

    fn index(&self, index: RigidBodyHandle) -> &RigidBody {
        &self.bodies[index.0 as usize]
    }
}

impl IndexMut<RigidBodyHandle> for RigidBodySet {
    fn index_mut(&mut self, index: RigidBodyHandle) -> &mut RigidBody {
        &mut self.bodies[index.0 as usize]
    }
}
