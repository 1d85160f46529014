//! Pools of short-lived math temporaries and fixed-length arrays.
//!
//! A [`ScratchPool`] belongs to exactly one single-threaded stepping context. Everything it hands
//! out is wrapped in a guard that gives the storage back when dropped, so a routine that returns
//! early (or bubbles an error up with `?`) cannot leave the pool unbalanced.
//!
//! The built-in revolute solver keeps its temporaries on the stack and only borrows the per-body
//! solver arrays through [`ScratchPool::array_of`]. The typed stacks behind
//! [`ScratchPool::acquire`] are there for joint variants and user routines that run inside a
//! stepping context and want pooled temporaries, through [`IslandSolver::pool`].
//!
//! [`IslandSolver::pool`]: crate::dynamics::solver::IslandSolver::pool

use crate::math::{Matrix2, Matrix3, Real, Rotation, Vector, Vector3};
use std::any::{type_name, Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// The maximum number of temporaries a single [`ScratchPool::acquire`] call can hand out.
pub const MAX_SCRATCH_ITEMS: usize = 16;

/// The per-type stack of released temporaries.
#[derive(Debug)]
pub struct ScratchStack<T> {
    free: RefCell<Vec<T>>,
    outstanding: Cell<usize>,
}

impl<T> Default for ScratchStack<T> {
    fn default() -> Self {
        Self {
            free: RefCell::new(Vec::new()),
            outstanding: Cell::new(0),
        }
    }
}

impl<T: Copy> ScratchStack<T> {
    fn take(&self, out: &mut [T], placeholder: T) {
        let mut free = self.free.borrow_mut();
        for item in out.iter_mut() {
            *item = free.pop().unwrap_or(placeholder);
        }
        self.outstanding.set(self.outstanding.get() + out.len());
    }

    fn give_back(&self, items: &[T]) {
        let outstanding = self.outstanding.get();
        debug_assert!(
            outstanding >= items.len(),
            "Released more scratch objects than were acquired."
        );
        self.outstanding.set(outstanding.saturating_sub(items.len()));
        // Released in reverse so that the next acquisition pops them back in order.
        self.free.borrow_mut().extend(items.iter().rev().copied());
    }
}

/// A math type that can be handed out by a [`ScratchPool`].
pub trait ScratchItem: Copy + 'static {
    /// The value used when the pool has to create a new temporary.
    fn placeholder() -> Self;
    /// The stack of `Self` inside `pool`.
    fn stack(pool: &ScratchPool) -> &ScratchStack<Self>;
}

macro_rules! impl_scratch_item(
    ($($T: ty, $field: ident, $placeholder: expr);* $(;)?) => {$(
        impl ScratchItem for $T {
            #[inline]
            fn placeholder() -> Self {
                $placeholder
            }

            #[inline]
            fn stack(pool: &ScratchPool) -> &ScratchStack<Self> {
                &pool.$field
            }
        }
    )*}
);

impl_scratch_item!(
    Vector<Real>, vectors, Vector::zeros();
    Vector3<Real>, vectors3, Vector3::zeros();
    Matrix2<Real>, matrices2, Matrix2::zeros();
    Matrix3<Real>, matrices3, Matrix3::zeros();
    Rotation<Real>, rotations, Rotation::identity();
);

/// Temporaries borrowed from a [`ScratchPool`].
///
/// Dereferences to a slice of exactly the requested length. The temporaries go back to the pool
/// when this guard is dropped.
pub struct Scratch<'a, T: ScratchItem> {
    stack: &'a ScratchStack<T>,
    items: [T; MAX_SCRATCH_ITEMS],
    len: usize,
}

impl<'a, T: ScratchItem> Scratch<'a, T> {
    /// Gives the temporaries back to the pool right away.
    pub fn release(self) {}
}

impl<'a, T: ScratchItem> Deref for Scratch<'a, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        &self.items[..self.len]
    }
}

impl<'a, T: ScratchItem> DerefMut for Scratch<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items[..self.len]
    }
}

impl<'a, T: ScratchItem> Drop for Scratch<'a, T> {
    fn drop(&mut self) {
        self.stack.give_back(&self.items[..self.len]);
    }
}

/// An array borrowed from a [`ScratchPool`].
///
/// The backing storage is given back to the pool when this guard is dropped, and handed out again
/// by the next request of the same element type and length.
pub struct PooledArray<'a, T: 'static> {
    arrays: &'a RefCell<HashMap<(TypeId, usize), Box<dyn Any>>>,
    data: Option<Box<Vec<T>>>,
}

impl<'a, T: 'static> Deref for PooledArray<'a, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.data.as_deref().map(|v| &v[..]).unwrap_or(&[])
    }
}

impl<'a, T: 'static> DerefMut for PooledArray<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.data
            .as_deref_mut()
            .map(|v| &mut v[..])
            .unwrap_or(&mut [])
    }
}

impl<'a, T: 'static> Drop for PooledArray<'a, T> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            let key = (TypeId::of::<T>(), data.len());
            let mut arrays = self.arrays.borrow_mut();

            if arrays.contains_key(&key) {
                log::warn!(
                    "Two pooled arrays of {} `{}` were alive at the same time; dropping one of them.",
                    key.1,
                    type_name::<T>()
                );
            } else {
                arrays.insert(key, data);
            }
        }
    }
}

/// A per-stepping-context allocator of temporary math objects and fixed-length arrays.
///
/// Once warmed up (i.e. after the first step exercised every request pattern), handing out
/// temporaries and arrays does not allocate.
///
/// The pool is not thread-safe: each thread running a stepping context needs its own pool.
#[derive(Default)]
pub struct ScratchPool {
    vectors: ScratchStack<Vector<Real>>,
    vectors3: ScratchStack<Vector3<Real>>,
    matrices2: ScratchStack<Matrix2<Real>>,
    matrices3: ScratchStack<Matrix3<Real>>,
    rotations: ScratchStack<Rotation<Real>>,
    arrays: RefCell<HashMap<(TypeId, usize), Box<dyn Any>>>,
}

impl ScratchPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrows `count` temporaries of type `T`.
    ///
    /// The content of the temporaries is unspecified: they may hold values left by a previous
    /// user of the pool.
    ///
    /// # Panics
    /// Panics if `count` exceeds [`MAX_SCRATCH_ITEMS`].
    ///
    /// # Example
    /// ```
    /// use pivot2d::data::ScratchPool;
    /// use pivot2d::math::{Real, Vector};
    ///
    /// fn lever_arms(pool: &ScratchPool, a: Vector<Real>, b: Vector<Real>) -> Real {
    ///     let mut arms = pool.acquire::<Vector<Real>>(2);
    ///     arms[0] = a;
    ///     arms[1] = b - a;
    ///     arms[0].perp(&arms[1])
    /// }
    ///
    /// let pool = ScratchPool::new();
    /// let cross = lever_arms(&pool, Vector::new(1.0, 0.0), Vector::new(1.0, 1.0));
    /// assert_eq!(cross, 1.0);
    /// assert_eq!(pool.outstanding::<Vector<Real>>(), 0);
    /// assert_eq!(pool.available::<Vector<Real>>(), 2);
    /// ```
    pub fn acquire<T: ScratchItem>(&self, count: usize) -> Scratch<'_, T> {
        assert!(
            count <= MAX_SCRATCH_ITEMS,
            "Cannot acquire more than {} scratch objects at once.",
            MAX_SCRATCH_ITEMS
        );
        let stack = T::stack(self);
        let mut items = [T::placeholder(); MAX_SCRATCH_ITEMS];
        stack.take(&mut items[..count], T::placeholder());

        Scratch {
            stack,
            items,
            len: count,
        }
    }

    /// The number of temporaries of type `T` currently borrowed from this pool.
    pub fn outstanding<T: ScratchItem>(&self) -> usize {
        T::stack(self).outstanding.get()
    }

    /// The number of released temporaries of type `T` ready to be handed out without allocation.
    pub fn available<T: ScratchItem>(&self) -> usize {
        T::stack(self).free.borrow().len()
    }

    /// Borrows an array of exactly `len` elements of type `T`.
    ///
    /// The first request for a given element type and length allocates and default-initializes
    /// the array. Subsequent requests with the same type and length return the same storage with
    /// the content left by its previous user.
    ///
    /// Two arrays with the same element type and length must not be alive at the same time.
    pub fn array_of<T: Clone + Default + 'static>(&self, len: usize) -> PooledArray<'_, T> {
        let key = (TypeId::of::<T>(), len);
        let existing = self.arrays.borrow_mut().remove(&key);

        let data = match existing.map(|data| data.downcast::<Vec<T>>()) {
            Some(Ok(data)) => data,
            _ => {
                log::debug!("Allocating a pooled array of {} `{}`.", len, type_name::<T>());
                Box::new(vec![T::default(); len])
            }
        };

        PooledArray {
            arrays: &self.arrays,
            data: Some(data),
        }
    }

    /// Drops every array of element type `T` kept by this pool, whatever its length.
    ///
    /// Arrays currently borrowed are not affected. Returns the number of arrays dropped.
    pub fn evict_arrays<T: 'static>(&self) -> usize {
        let mut arrays = self.arrays.borrow_mut();
        let num_arrays = arrays.len();
        arrays.retain(|(type_id, _), _| *type_id != TypeId::of::<T>());
        let num_evicted = num_arrays - arrays.len();

        if num_evicted > 0 {
            log::debug!(
                "Evicted {} pooled array(s) of `{}`.",
                num_evicted,
                type_name::<T>()
            );
        }

        num_evicted
    }

    /// The number of distinct arrays (per element type and length) currently kept by this pool.
    pub fn num_pooled_arrays(&self) -> usize {
        self.arrays.borrow().len()
    }
}
