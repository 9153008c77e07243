use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
    sync::{Arc, Mutex, MutexGuard},
};

// TbObj lets tasks mutably share testbench objects (events, transactions
// in flight, etc.). The simulation is single threaded, so Rc/RefCell are
// fine even though the executor demands Send + Sync.
pub struct TbObj<T>(Rc<RefCell<T>>);

impl<T> TbObj<T> {
    pub fn new(data: T) -> TbObj<T> {
        TbObj(Rc::new(RefCell::new(data)))
    }
    pub fn get(&self) -> Ref<T> {
        (*self.0).borrow()
    }
    pub fn get_mut(&self) -> RefMut<T> {
        (*self.0).borrow_mut()
    }
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl<T> Clone for TbObj<T> {
    fn clone(&self) -> Self {
        TbObj(self.0.clone())
    }
}

// Rc is neither Send nor Sync but in this context it's safe.
unsafe impl<T> Send for TbObj<T> {}
unsafe impl<T> Sync for TbObj<T> {}

// Mutex-backed variant for data that outlives a single simulation run
// (test registry, current-test slot).
pub struct TbObjSafe<T>(Arc<Mutex<T>>);

impl<T> TbObjSafe<T> {
    pub fn new(data: T) -> TbObjSafe<T> {
        TbObjSafe(Arc::new(Mutex::new(data)))
    }
    pub fn get(&self) -> MutexGuard<T> {
        (*self.0).try_lock().unwrap()
    }
    pub fn get_mut(&self) -> MutexGuard<T> {
        (*self.0).try_lock().unwrap()
    }
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.try_lock().unwrap())
    }
}

impl<T> Clone for TbObjSafe<T> {
    fn clone(&self) -> Self {
        TbObjSafe(self.0.clone())
    }
}
