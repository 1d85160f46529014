use super::{SolverData, SolverPosition, SolverVelocity, TimeStep};
use crate::data::ScratchPool;
use crate::dynamics::{
    IntegrationParameters, Joint, JointConstraint, JointSet, LockedAxes, RigidBodySet,
};
use crate::math::{Real, Vector};

/// A stepping context running the joint solver on every body of a `RigidBodySet`.
///
/// The solver arrays are borrowed from a [`ScratchPool`] owned by this context so that steps
/// with a constant number of bodies do not allocate.
#[derive(Default)]
pub struct IslandSolver {
    pool: ScratchPool,
    prev_dt: Real,
    num_solver_bodies: usize,
}

impl IslandSolver {
    /// Creates a new stepping context.
    pub fn new() -> Self {
        Self::default()
    }

    /// The pool providing the solver arrays.
    pub fn pool(&self) -> &ScratchPool {
        &self.pool
    }

    /// Advances the simulation of `bodies` by `params.dt`, subject to gravity and `joints`.
    ///
    /// Returns `true` if the position iterations brought every joint within its tolerances.
    /// A step with a non-positive `dt` leaves the bodies and the accumulated impulses
    /// untouched, and returns `true`.
    pub fn step(
        &mut self,
        gravity: &Vector<Real>,
        params: &IntegrationParameters,
        bodies: &mut RigidBodySet,
        joints: &mut JointSet,
    ) -> bool {
        let dt = params.dt;
        if dt <= 0.0 {
            return true;
        }

        let dt_ratio = if self.prev_dt > 0.0 {
            dt / self.prev_dt
        } else {
            1.0
        };
        self.prev_dt = dt;

        wake_up_jointed_bodies(bodies, joints);

        if bodies.len() != self.num_solver_bodies {
            // Arrays sized for the previous body count will not be requested again.
            self.pool.evict_arrays::<SolverPosition>();
            self.pool.evict_arrays::<SolverVelocity>();
            self.num_solver_bodies = bodies.len();
        }

        let mut positions = self.pool.array_of::<SolverPosition>(bodies.len());
        let mut velocities = self.pool.array_of::<SolverVelocity>(bodies.len());

        for (i, (_, rb)) in bodies.iter_mut().enumerate() {
            rb.island_index = i;
            positions[i] = SolverPosition {
                center: rb.center_of_mass(),
                angle: rb.angle,
            };

            let mut linear = rb.linvel;
            let mut angular = rb.angvel;

            if rb.is_awake_dynamic() {
                if rb.locked_axes.contains(LockedAxes::TRANSLATION_LOCKED) {
                    linear = Vector::zeros();
                } else {
                    linear += gravity * dt;
                }

                if rb.locked_axes.contains(LockedAxes::ROTATION_LOCKED) {
                    angular = 0.0;
                }
            }

            velocities[i] = SolverVelocity { linear, angular };
        }

        let bodies_ref = &*bodies;

        let step = TimeStep::from_params(params, dt_ratio);
        let mut data = SolverData::new(step, &mut positions, &mut velocities);

        for (_, joint) in joints.iter_mut().filter(|(_, j)| is_active(bodies_ref, j)) {
            joint.init_velocity_constraints(bodies_ref, &mut data);
        }

        for _ in 0..params.num_velocity_iterations {
            for (_, joint) in joints.iter_mut().filter(|(_, j)| is_active(bodies_ref, j)) {
                joint.solve_velocity_constraints(&mut data);
            }
        }

        for (_, rb) in bodies_ref.iter() {
            if rb.is_fixed() || rb.is_sleeping() {
                continue;
            }

            let vels = data.velocities[rb.island_index];
            let pos = &mut data.positions[rb.island_index];
            pos.center += vels.linear * dt;
            pos.angle += vels.angular * dt;
        }

        let mut converged = false;
        let mut num_iterations = 0;

        for _ in 0..params.num_position_iterations {
            num_iterations += 1;
            let mut solved = true;

            for (_, joint) in joints.iter_mut().filter(|(_, j)| is_active(bodies_ref, j)) {
                solved &= joint.solve_position_constraints(&mut data);
            }

            if solved {
                converged = true;
                break;
            }
        }

        log::trace!(
            "Joint position solver {} after {} iteration(s).",
            if converged {
                "converged"
            } else {
                "did not converge"
            },
            num_iterations
        );

        for (_, rb) in bodies.iter_mut() {
            if rb.is_fixed() || rb.is_sleeping() {
                continue;
            }

            let pos = data.positions[rb.island_index];
            let vels = data.velocities[rb.island_index];
            rb.angle = pos.angle;
            rb.translation = pos.center.coords - rb.rotation() * rb.local_com.coords;
            rb.linvel = vels.linear;
            rb.angvel = vels.angular;
        }

        converged
    }
}

/// Does the joint touch an awake dynamic body?
fn is_active(bodies: &RigidBodySet, joint: &Joint) -> bool {
    bodies[joint.body1()].is_awake_dynamic() || bodies[joint.body2()].is_awake_dynamic()
}

/// Wakes up every body attached, directly or through other joints, to an awake dynamic body.
fn wake_up_jointed_bodies(bodies: &mut RigidBodySet, joints: &JointSet) {
    loop {
        let mut woke_up_any = false;

        for (_, joint) in joints.iter() {
            let (h1, h2) = (joint.body1(), joint.body2());

            if bodies[h1].is_awake_dynamic() && bodies[h2].is_sleeping() {
                bodies[h2].wake_up();
                woke_up_any |= bodies[h2].is_dynamic();
            }

            if bodies[h2].is_awake_dynamic() && bodies[h1].is_sleeping() {
                bodies[h1].wake_up();
                woke_up_any |= bodies[h1].is_dynamic();
            }
        }

        if !woke_up_any {
            break;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamics::{RevoluteJointDef, RigidBodyBuilder, RigidBodyHandle};
    use crate::math::Point;
    use approx::assert_relative_eq;

    #[test]
    fn sleeping_joints_are_skipped() {
        let mut bodies = RigidBodySet::new();
        let mut joints = JointSet::new();
        let ground = bodies.insert(RigidBodyBuilder::fixed());
        let bob = bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(Vector::new(1.0, 0.0))
                .sleeping(true),
        );
        joints
            .insert(
                &bodies,
                &RevoluteJointDef::new(ground, bob).local_anchor2(Point::new(-1.0, 0.0)),
            )
            .unwrap();

        let mut solver = IslandSolver::new();
        let gravity = Vector::new(0.0, -9.81);
        assert!(solver.step(&gravity, &IntegrationParameters::default(), &mut bodies, &mut joints));

        assert!(bodies[bob].is_sleeping());
        assert_eq!(*bodies[bob].translation(), Vector::new(1.0, 0.0));
        assert_eq!(*bodies[bob].linvel(), Vector::zeros());
    }

    #[test]
    fn wake_up_propagates_through_joints() {
        let mut bodies = RigidBodySet::new();
        let mut joints = JointSet::new();
        let h1 = bodies.insert(RigidBodyBuilder::dynamic());
        let h2 = bodies.insert(RigidBodyBuilder::dynamic().sleeping(true));
        let h3 = bodies.insert(RigidBodyBuilder::dynamic().sleeping(true));
        let h4 = bodies.insert(RigidBodyBuilder::dynamic().sleeping(true));

        joints.insert(&bodies, &RevoluteJointDef::new(h3, h2)).unwrap();
        joints.insert(&bodies, &RevoluteJointDef::new(h2, h1)).unwrap();

        wake_up_jointed_bodies(&mut bodies, &joints);
        assert!(!bodies[h2].is_sleeping());
        assert!(!bodies[h3].is_sleeping());
        assert!(bodies[h4].is_sleeping());
    }

    #[test]
    fn solver_arrays_are_reused() {
        let mut bodies = RigidBodySet::new();
        let mut joints = JointSet::new();
        let ground = bodies.insert(RigidBodyBuilder::fixed());
        let bob = bodies.insert(RigidBodyBuilder::dynamic().translation(Vector::new(1.0, 0.0)));
        joints
            .insert(
                &bodies,
                &RevoluteJointDef::new(ground, bob).local_anchor2(Point::new(-1.0, 0.0)),
            )
            .unwrap();

        let mut solver = IslandSolver::new();
        let params = IntegrationParameters::default();
        for _ in 0..10 {
            solver.step(&Vector::new(0.0, -9.81), &params, &mut bodies, &mut joints);
            assert_eq!(solver.pool().num_pooled_arrays(), 2);
        }

        let joint = &joints.iter().next().unwrap().1;
        assert_relative_eq!(
            joint.anchor1(&bodies),
            joint.anchor2(&bodies),
            epsilon = params.linear_slop
        );
    }

    fn pendulum() -> (RigidBodySet, JointSet, RigidBodyHandle) {
        let mut bodies = RigidBodySet::new();
        let mut joints = JointSet::new();
        let ground = bodies.insert(RigidBodyBuilder::fixed());
        let bob = bodies.insert(RigidBodyBuilder::dynamic().translation(Vector::new(1.0, 0.0)));
        joints
            .insert(
                &bodies,
                &RevoluteJointDef::new(ground, bob).local_anchor2(Point::new(-1.0, 0.0)),
            )
            .unwrap();
        (bodies, joints, bob)
    }

    #[test]
    fn growing_body_sets_do_not_accumulate_arrays() {
        let (mut bodies, mut joints, _) = pendulum();
        let mut solver = IslandSolver::new();
        let params = IntegrationParameters::default();
        let gravity = Vector::new(0.0, -9.81);

        for i in 0..5 {
            solver.step(&gravity, &params, &mut bodies, &mut joints);
            assert_eq!(solver.pool().num_pooled_arrays(), 2);
            bodies.insert(RigidBodyBuilder::dynamic().translation(Vector::new(i as Real, 5.0)));
        }
    }

    #[test]
    fn zero_length_steps_keep_warm_starting() {
        let (mut bodies, mut joints, bob) = pendulum();
        let (mut ref_bodies, mut ref_joints, _) = pendulum();
        let mut solver = IslandSolver::new();
        let mut ref_solver = IslandSolver::new();
        let mut params = IntegrationParameters::default();
        let gravity = Vector::new(0.0, -9.81);

        for _ in 0..5 {
            solver.step(&gravity, &params, &mut bodies, &mut joints);
            ref_solver.step(&gravity, &params, &mut ref_bodies, &mut ref_joints);
        }

        let handle = joints.iter().next().unwrap().0;
        let impulse = joints[handle].as_revolute().unwrap().impulse();
        let translation = *bodies[bob].translation();
        let linvel = *bodies[bob].linvel();
        assert!(impulse.norm() > 0.0);

        params.dt = 0.0;
        assert!(solver.step(&gravity, &params, &mut bodies, &mut joints));
        assert_eq!(joints[handle].as_revolute().unwrap().impulse(), impulse);
        assert_eq!(*bodies[bob].translation(), translation);
        assert_eq!(*bodies[bob].linvel(), linvel);
        assert_eq!(solver.prev_dt, IntegrationParameters::default().dt);

        // The empty step has no effect on the following ones.
        params.dt = IntegrationParameters::default().dt;
        solver.step(&gravity, &params, &mut bodies, &mut joints);
        ref_solver.step(&gravity, &params, &mut ref_bodies, &mut ref_joints);
        assert_eq!(
            joints[handle].as_revolute().unwrap().impulse(),
            ref_joints[handle].as_revolute().unwrap().impulse()
        );
        assert_eq!(bodies[bob].translation(), ref_bodies[bob].translation());
        assert_eq!(bodies[bob].angle(), ref_bodies[bob].angle());
    }

    #[test]
    fn translation_locked_bodies_do_not_fall() {
        let mut bodies = RigidBodySet::new();
        let mut joints = JointSet::new();
        let wheel = bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(Vector::new(0.0, 2.0))
                .linvel(Vector::new(1.0, 0.0))
                .angvel(1.0)
                .locked_axes(LockedAxes::TRANSLATION_LOCKED),
        );

        let mut solver = IslandSolver::new();
        let params = IntegrationParameters::default();
        for _ in 0..10 {
            solver.step(&Vector::new(0.0, -9.81), &params, &mut bodies, &mut joints);
        }

        assert_eq!(*bodies[wheel].translation(), Vector::new(0.0, 2.0));
        assert_eq!(*bodies[wheel].linvel(), Vector::zeros());
        assert_relative_eq!(bodies[wheel].angvel(), 1.0);
        assert_relative_eq!(bodies[wheel].angle(), 10.0 * params.dt, epsilon = 1.0e-5);
    }
}
