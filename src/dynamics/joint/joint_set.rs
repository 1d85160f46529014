use super::{Joint, JointConstraint, JointError, RevoluteJoint, RevoluteJointDef};
use crate::dynamics::solver::SolverData;
use crate::dynamics::RigidBodySet;
use std::ops::{Index, IndexMut};

/// The unique identifier of a joint added to the joint set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct JointHandle(pub(crate) u32);

impl JointHandle {
    /// Converts this handle into its raw index.
    pub fn into_raw_parts(self) -> u32 {
        self.0
    }

    /// Reconstructs an handle from its raw index.
    pub fn from_raw_parts(id: u32) -> Self {
        Self(id)
    }

    /// An always-invalid joint handle.
    pub fn invalid() -> Self {
        Self(u32::MAX)
    }
}

#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default)]
/// A set of joints, solved in insertion order.
pub struct JointSet {
    joints: Vec<Joint>,
}

impl JointSet {
    /// Creates a new empty set of joints.
    pub fn new() -> Self {
        Self { joints: Vec::new() }
    }

    /// The number of joints on this set.
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    /// `true` if there are no joints in this set.
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Is the given joint handle valid?
    pub fn contains(&self, handle: JointHandle) -> bool {
        (handle.0 as usize) < self.joints.len()
    }

    /// Inserts a new revolute joint between two bodies of `bodies`.
    pub fn insert(
        &mut self,
        bodies: &RigidBodySet,
        def: &RevoluteJointDef,
    ) -> Result<JointHandle, JointError> {
        for body in [def.body1, def.body2] {
            if !bodies.contains(body) {
                return Err(JointError::InvalidBodyHandle(body));
            }
        }

        let handle = JointHandle(self.joints.len() as u32);
        log::debug!(
            "Inserting revolute joint {:?} between {:?} and {:?}.",
            handle,
            def.body1,
            def.body2
        );
        self.joints.push(Joint::Revolute(RevoluteJoint::new(def)));
        Ok(handle)
    }

    /// Gets the joint with the given handle.
    pub fn get(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle.0 as usize)
    }

    /// Gets a mutable reference to the joint with the given handle.
    pub fn get_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        self.joints.get_mut(handle.0 as usize)
    }

    /// Iterates through all the joints on this set, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (JointHandle, &Joint)> {
        self.joints
            .iter()
            .enumerate()
            .map(|(i, j)| (JointHandle(i as u32), j))
    }

    /// Iterates mutably through all the joints on this set, in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (JointHandle, &mut Joint)> {
        self.joints
            .iter_mut()
            .enumerate()
            .map(|(i, j)| (JointHandle(i as u32), j))
    }

    /// Initializes the velocity constraints of every joint.
    pub fn init_velocity_constraints(&mut self, bodies: &RigidBodySet, data: &mut SolverData) {
        for joint in &mut self.joints {
            joint.init_velocity_constraints(bodies, data);
        }
    }

    /// Runs one velocity iteration on every joint.
    pub fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        for joint in &mut self.joints {
            joint.solve_velocity_constraints(data);
        }
    }

    /// Runs one position iteration on every joint.
    ///
    /// Returns `true` if every joint is within the slop tolerances.
    pub fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let mut solved = true;
        for joint in &mut self.joints {
            solved &= joint.solve_position_constraints(data);
        }
        solved
    }
}

impl Index<JointHandle> for JointSet {
    type Output = Joint;

    fn index(&self, index: JointHandle) -> &Joint {
        &self.joints[index.0 as usize]
    }
}

impl IndexMut<JointHandle> for JointSet {
    fn index_mut(&mut self, index: JointHandle) -> &mut Joint {
        &mut self.joints[index.0 as usize]
    }
}
