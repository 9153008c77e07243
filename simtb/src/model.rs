//! In-process simulation backend.
//!
//! Stands in for a hardware simulator when the crate is built without the
//! `vpi` feature: signals live in a table, callbacks are dispatched by a
//! small delta-cycle kernel, and behavioral device models run as ordinary
//! forked tasks. Used by the library's own tests and for headless runs of a
//! testbench against a behavioral model.

use intmap::IntMap;
use lazy_static::lazy_static;
use std::collections::{BTreeMap, HashMap};

use crate::signal::{self, ObjectKind};
use crate::sim_if::{time_prefix, SimCallback, SimIf, SIM_IF};
use crate::tb_obj::TbObjSafe;
use crate::test::{self, TbTests};
use crate::trigger::{self, EdgeKind};
use crate::{executor, SimpleResult, TbResult};

lazy_static! {
    static ref KERNEL: TbObjSafe<Kernel> = TbObjSafe::new(Kernel::new());
}

struct ModelSignal {
    name: String,
    width: u32,
    value: u128,
}

enum CbKind {
    Time(u64), // absolute step time
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

struct Kernel {
    time: u64,
    next_handle: usize,
    root: Option<(usize, String)>,
    signals: IntMap<ModelSignal>,
    names: HashMap<String, usize>,
    callbacks: IntMap<CbKind>,
    timers: BTreeMap<u64, Vec<usize>>,
    edge_watch: IntMap<usize>,
    rw: Vec<usize>,
    ro: Vec<usize>,
    pending_edges: Vec<(usize, EdgeKind)>,
}

impl Kernel {
    fn new() -> Self {
        Self {
            time: 0,
            next_handle: 1,
            root: None,
            signals: IntMap::new(),
            names: HashMap::new(),
            callbacks: IntMap::new(),
            timers: BTreeMap::new(),
            edge_watch: IntMap::new(),
            rw: Vec::new(),
            ro: Vec::new(),
            pending_edges: Vec::new(),
        }
    }

    fn alloc_handle(&mut self) -> usize {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn write(&mut self, handle: usize, value: u128) -> SimpleResult<()> {
        let sig = self.signals.get_mut(handle as u64).ok_or(())?;
        let mask = if sig.width == 128 {
            u128::MAX
        } else {
            (1u128 << sig.width) - 1
        };
        let value = value & mask;
        if value == sig.value {
            return Ok(());
        }
        let edge = if sig.width == 1 {
            match value {
                1 => EdgeKind::Rising,
                _ => EdgeKind::Falling,
            }
        } else {
            EdgeKind::Any
        };
        sig.value = value;
        self.pending_edges.push((handle, edge));
        Ok(())
    }

    fn take_rw(&mut self) -> Vec<usize> {
        let handles = std::mem::take(&mut self.rw);
        for h in &handles {
            self.callbacks.remove(*h as u64);
        }
        handles
    }

    fn take_ro(&mut self) -> Vec<usize> {
        let handles = std::mem::take(&mut self.ro);
        for h in &handles {
            self.callbacks.remove(*h as u64);
        }
        handles
    }

    fn pop_next_timer(&mut self) -> Option<(u64, Vec<usize>)> {
        let t = *self.timers.keys().next()?;
        let handles = self.timers.remove(&t).unwrap();
        for h in &handles {
            self.callbacks.remove(*h as u64);
        }
        Some((t, handles))
    }
}

pub(crate) struct ModelSim;

impl ModelSim {
    pub(crate) fn new() -> Self {
        ModelSim
    }
}

impl SimIf for ModelSim {
    fn set_value_i32(&self, handle: usize, value: i32, _force: bool) -> SimpleResult<()> {
        KERNEL.with_mut(|k| k.write(handle, value as u32 as u128))
    }
    fn get_value_i32(&self, handle: usize) -> SimpleResult<i32> {
        KERNEL.with_mut(|k| {
            let sig = k.signals.get(handle as u64).ok_or(())?;
            Ok(sig.value as u32 as i32)
        })
    }
    fn set_value_bin(&self, handle: usize, value: String, _force: bool) -> SimpleResult<()> {
        let val = signal::bin_to_u128(&value).ok_or(())?;
        KERNEL.with_mut(|k| k.write(handle, val))
    }
    fn get_value_bin(&self, handle: usize) -> SimpleResult<String> {
        KERNEL.with_mut(|k| {
            let sig = k.signals.get(handle as u64).ok_or(())?;
            Ok(signal::u128_to_bin(sig.value, sig.width))
        })
    }
    fn release(&self, _handle: usize) -> SimpleResult<()> {
        // the model knows no forced values
        Ok(())
    }
    fn get_handle_by_name(&self, name: &str) -> SimpleResult<usize> {
        KERNEL.with_mut(|k| k.names.get(name).copied().ok_or(()))
    }
    fn get_root_handle(&self) -> SimpleResult<usize> {
        KERNEL.with_mut(|k| k.root.as_ref().map(|(h, _)| *h).ok_or(()))
    }
    fn get_full_name(&self, handle: usize) -> SimpleResult<String> {
        KERNEL.with_mut(|k| {
            if let Some((root, name)) = &k.root {
                if *root == handle {
                    return Ok(name.clone());
                }
            }
            k.signals
                .get(handle as u64)
                .map(|s| s.name.clone())
                .ok_or(())
        })
    }
    fn get_size(&self, handle: usize) -> i32 {
        KERNEL.with_mut(|k| k.signals.get(handle as u64).map(|s| s.width as i32).unwrap_or(0))
    }
    fn get_kind(&self, handle: usize) -> ObjectKind {
        KERNEL.with_mut(|k| {
            if let Some((root, _)) = &k.root {
                if *root == handle {
                    return ObjectKind::Hier;
                }
            }
            match k.signals.get(handle as u64) {
                Some(sig) => ObjectKind::Int(sig.width as i32),
                None => ObjectKind::Other,
            }
        })
    }
    fn register_callback(&self, cb: SimCallback) -> SimpleResult<usize> {
        KERNEL.with_mut(|k| {
            let handle = k.alloc_handle();
            match cb {
                SimCallback::Time(delta) => {
                    let abs = k.time + delta;
                    k.callbacks.insert(handle as u64, CbKind::Time(abs));
                    k.timers.entry(abs).or_default().push(handle);
                }
                SimCallback::Edge(sig_hdl) => {
                    if k.edge_watch.contains_key(sig_hdl as u64) {
                        panic!("Duplicate edge callback for signal handle {}", sig_hdl);
                    }
                    k.callbacks.insert(handle as u64, CbKind::Edge(sig_hdl));
                    k.edge_watch.insert(sig_hdl as u64, handle);
                }
                SimCallback::ReadWrite => {
                    k.callbacks.insert(handle as u64, CbKind::ReadWrite);
                    k.rw.push(handle);
                }
                SimCallback::ReadOnly => {
                    k.callbacks.insert(handle as u64, CbKind::ReadOnly);
                    k.ro.push(handle);
                }
            }
            Ok(handle)
        })
    }
    fn cancel_callback(&self, cb_hdl: usize) -> SimpleResult<()> {
        // lenient on unknown handles so teardown can sweep blindly
        KERNEL.with_mut(|k| {
            if let Some(kind) = k.callbacks.remove(cb_hdl as u64) {
                match kind {
                    CbKind::Time(abs) => {
                        if let Some(handles) = k.timers.get_mut(&abs) {
                            handles.retain(|h| *h != cb_hdl);
                            if handles.is_empty() {
                                k.timers.remove(&abs);
                            }
                        }
                    }
                    CbKind::Edge(sig_hdl) => {
                        k.edge_watch.remove(sig_hdl as u64);
                    }
                    CbKind::ReadWrite => k.rw.retain(|h| *h != cb_hdl),
                    CbKind::ReadOnly => k.ro.retain(|h| *h != cb_hdl),
                }
            }
            Ok(())
        })
    }
    fn get_sim_time_steps(&self) -> u64 {
        KERNEL.with_mut(|k| k.time)
    }
    fn get_sim_precision(&self) -> i8 {
        // 1 step = 1 ps
        -12
    }
    fn log(&self, msg: &str) {
        println!("{} {}", time_prefix(self.get_sim_time("ns")), msg);
    }
}

/// Declares the DUT surface and resets all model state from any previous
/// run. Signal names become `<module>.<signal>`.
pub fn define_module(module: &str, signals: &[(&str, u32)]) {
    executor::clear_ready_queue();
    trigger::cancel_all_triggers();
    crate::reset_current_test();
    signal::clear_sig_maps();
    KERNEL.with_mut(|k| {
        *k = Kernel::new();
        let root = k.alloc_handle();
        k.root = Some((root, module.to_string()));
        for (name, width) in signals {
            assert!(*width >= 1 && *width <= 128, "Unsupported signal width.");
            let handle = k.alloc_handle();
            let full_name = format!("{}.{}", module, name);
            k.names.insert(full_name.clone(), handle);
            k.signals.insert(
                handle as u64,
                ModelSignal {
                    name: full_name,
                    width: *width,
                    value: 0,
                },
            );
        }
    });
}

/// Runs the given tests to completion, bounded by `max_time_ns` of
/// simulated time. This bound is the global simulation timeout: a test
/// still unresolved when it expires is failed, not left hanging.
pub fn run_tests(tests: TbTests, max_time_ns: u64) -> Vec<(String, TbResult)> {
    test::set_tests(tests);
    let max_steps = SIM_IF.get_sim_steps(max_time_ns as f64, "ns");
    crate::start_of_simulation();
    loop {
        if test::all_tests_resolved() {
            break;
        }
        if !step() {
            // no pending events left, the simulation has starved
            break;
        }
        if KERNEL.with_mut(|k| k.time) > max_steps {
            crate::fail_test("simulation time limit reached");
            break;
        }
    }
    crate::end_of_simulation();
    test::collect_results()
}

/// Executes one time slot plus the advance to the next timer. Returns false
/// once no timer remains.
fn step() -> bool {
    settle();
    loop {
        let ro = KERNEL.with_mut(|k| k.take_ro());
        if ro.is_empty() {
            break;
        }
        for _ in ro {
            trigger::react(SimCallback::ReadOnly, None);
        }
        settle();
    }
    let next = KERNEL.with_mut(|k| k.pop_next_timer());
    match next {
        Some((t, handles)) => {
            KERNEL.with_mut(|k| k.time = t);
            for _ in handles {
                trigger::react(SimCallback::Time(t), None);
            }
            true
        }
        None => false,
    }
}

/// Delivers value-change and ReadWrite callbacks until the current time
/// slot is quiescent. Value changes made while tasks execute are collected
/// and delivered here, never re-entrantly.
fn settle() {
    loop {
        let edges = KERNEL.with_mut(|k| std::mem::take(&mut k.pending_edges));
        if !edges.is_empty() {
            for (sig_hdl, kind) in edges {
                let watched = KERNEL.with_mut(|k| k.edge_watch.contains_key(sig_hdl as u64));
                if watched {
                    trigger::react(SimCallback::Edge(sig_hdl), Some(kind));
                }
            }
            continue;
        }
        let rw = KERNEL.with_mut(|k| k.take_rw());
        if rw.is_empty() {
            break;
        }
        for _ in rw {
            trigger::react(SimCallback::ReadWrite, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use crate::testbench::{ClockDomain, ResetActiveLevel};
    use crate::utils;
    use futures::future::FutureExt;
    use serial_test::serial;

    async fn timer_order(_dut: SimObject) -> TbResult {
        let t0 = SIM_IF.get_sim_time_steps();
        Trigger::timer(1, "ns").await;
        let t1 = SIM_IF.get_sim_time_steps();
        Trigger::timer(2, "ns").await;
        let t2 = SIM_IF.get_sim_time_steps();
        if t1 != t0 + 1000 || t2 != t1 + 2000 {
            return Err(Val::String(format!("unexpected times: {} {} {}", t0, t1, t2)));
        }
        Ok(Val::None)
    }

    #[test]
    #[serial]
    fn timers_fire_in_time_order() {
        define_module("top", &[("clk", 1)]);
        let mut tests = TbTests::new();
        tests.push(Test::new("timer_order".to_string(), |dut| {
            timer_order(dut).boxed()
        }));
        let results = run_tests(tests, 1_000);
        assert!(results[0].1.is_ok(), "{:?}", results);
    }

    async fn rw_visible_in_ro(dut: SimObject) -> TbResult {
        let data = dut.c("data");
        Task::fork(async move {
            Trigger::timer_rw(1, "ns").await?;
            data.set_u32(0xAB);
            Ok(Val::None)
        });
        Trigger::timer_ro(1, "ns").await?;
        // the ReadWrite phase runs before ReadOnly within the time slot
        if data.u32() != 0xAB {
            return Err(Val::String(format!("read {:#x}", data.u32())));
        }
        Ok(Val::None)
    }

    #[test]
    #[serial]
    fn read_write_phase_precedes_read_only() {
        define_module("top", &[("data", 8)]);
        let mut tests = TbTests::new();
        tests.push(Test::new("rw_visible_in_ro".to_string(), |dut| {
            rw_visible_in_ro(dut).boxed()
        }));
        let results = run_tests(tests, 1_000);
        assert!(results[0].1.is_ok(), "{:?}", results);
    }

    async fn reset_sequence(dut: SimObject) -> TbResult {
        let clk = dut.c("clk");
        let resetn = dut.c("resetn");
        let cd = ClockDomain::new(clk, 400, "ps", resetn, ResetActiveLevel::Low);
        Task::fork(cd.clone().start());
        cd.event_end_reset.wait().await;
        if resetn.u32() != 1 {
            return Err(Val::String("reset still asserted".to_string()));
        }
        // 10 cycles of 400 ps
        if SIM_IF.get_sim_time_steps() != 4_000 {
            return Err(Val::String(format!(
                "end of reset at {} steps",
                SIM_IF.get_sim_time_steps()
            )));
        }
        utils::clock_cycles(clk, 2).await?;
        Ok(Val::None)
    }

    #[test]
    #[serial]
    fn clock_domain_releases_reset_once() {
        define_module("top", &[("clk", 1), ("resetn", 1)]);
        let mut tests = TbTests::new();
        tests.push(Test::new("reset_sequence".to_string(), |dut| {
            reset_sequence(dut).boxed()
        }));
        let results = run_tests(tests, 100_000);
        assert!(results[0].1.is_ok(), "{:?}", results);
    }

    async fn never_completes(dut: SimObject) -> TbResult {
        let clk = dut.c("clk");
        Task::fork(ClockDomain::without_reset(clk, 400, "ps").start());
        // waits on a notification that never comes
        let event: Event<()> = Event::new();
        event.wait().await;
        Ok(Val::None)
    }

    #[test]
    #[serial]
    fn time_limit_fails_stuck_test() {
        define_module("top", &[("clk", 1)]);
        let mut tests = TbTests::new();
        tests.push(Test::new("never_completes".to_string(), |dut| {
            never_completes(dut).boxed()
        }));
        let results = run_tests(tests, 50);
        assert!(results[0].1.is_err());
    }
}
