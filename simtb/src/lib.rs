mod event;
mod executor;
#[cfg(not(feature = "vpi"))]
pub mod model;
pub mod prelude;
mod report;
pub mod signal;
pub mod sim_if;
pub mod tb_obj;
pub mod test;
pub mod testbench;
mod trigger;
pub mod utils;
mod value;
#[cfg(feature = "vpi")]
pub mod vpi;
#[cfg(feature = "vpi")]
mod vpi_user;

pub use futures;

use executor::Task;
use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use sim_if::SIM_IF;
use std::sync::Arc;
use std::time;
use tb_obj::TbObjSafe;
use value::Val;

pub type SimpleResult<T> = Result<T, ()>;
pub type TbResult = Result<Val, Val>;

lazy_static! {
    static ref SIM_START_TIME: TbObjSafe<Option<time::Instant>> = TbObjSafe::new(None);
}
lazy_static! {
    static ref CURRENT_TEST: TbObjSafe<Option<(Arc<Task>, TbObjSafe<test::Test>)>> =
        TbObjSafe::new(None);
}
pub static CRATE_NAME: OnceCell<String> = OnceCell::new();

pub fn pass_test(msg: &str) {
    // Passes test that has not already failed/passed
    if let Some((task, test)) = CURRENT_TEST.get().take() {
        test.with_mut(|t| t.set_result(Ok(Val::String(msg.to_string()))));
        tear_down_test(task);
    }
}

pub fn fail_test(msg: &str) {
    // Fails test that has not already failed/passed
    if let Some((task, test)) = CURRENT_TEST.get().take() {
        test.with_mut(|t| t.set_result(Err(Val::String(msg.to_string()))));
        tear_down_test(task);
    }
}

fn tear_down_test(test: Arc<Task>) {
    trigger::cancel_all_triggers();
    executor::clear_ready_queue();
    test.cancel();
}

pub(crate) fn reset_current_test() {
    CURRENT_TEST.with_mut(|c| {
        let _ = c.take();
    });
}

pub(crate) fn start_of_simulation() {
    // start timer
    SIM_START_TIME.with_mut(|t| {
        let _ = t.replace(time::Instant::now());
    });

    let sim_root = signal::SimObject::get_root().unwrap();

    // All tests are scheduled in a chain at simulation start up by awaiting
    // the previous test's completion. The wrapping logic handles test
    // results and timers.
    let mut join_handle: Option<executor::JoinHandle> = None;
    for test in test::registered_tests() {
        let prev = join_handle.take();
        join_handle = Some(Task::spawn_from_future(async move {
            // await previous test, if there is one
            if let Some(handle) = prev {
                let _ = handle.await;
            }
            // spawn next test
            let test_for_task = test.clone();
            let test_handle = Task::spawn_from_future(async move {
                let time_start = time::Instant::now();
                let sim_time_start = SIM_IF.get_sim_time("ns");
                let generator = test_for_task.get().generator;
                // await test execution
                let result = (generator)(sim_root).await;

                test_for_task.with_mut(|test| {
                    test.time_secs = time_start.elapsed().as_secs_f64();
                    test.sim_time_ns = SIM_IF.get_sim_time("ns") - sim_time_start;
                });
                match result {
                    Ok(val) => pass_test(&format!("{:?}", val)),
                    Err(val) => fail_test(&format!("{:?}", val)),
                }
                Ok(Val::None)
            });
            // set current test handle
            let test_task = test_handle.get_task().unwrap().clone();
            CURRENT_TEST.with_mut(move |c| {
                let _ = c.replace((test_task, test));
            });
            // await test execution
            let _ = test_handle.await;
            Ok(Val::None)
        }));
    }

    // execute first simulation tick
    executor::run_once();
}

pub(crate) fn end_of_simulation() {
    let duration = SIM_START_TIME
        .with_mut(|t| t.take())
        .map(|t| t.elapsed().as_secs_f64())
        .unwrap_or(0.0);
    let final_sim_time = SIM_IF.get_sim_time("ns");

    let tests = test::registered_tests();
    report::print_summary(&tests);

    SIM_IF.log(&format!("Simulation time: {} ns", final_sim_time));
    SIM_IF.log(&format!("Real time: {:.3} s", duration));
    if duration > 0.0 {
        SIM_IF.log(&format!(
            "Simulation speed: {:.3} ns/s",
            final_sim_time / duration
        ));
    }

    #[cfg(feature = "vpi")]
    report::write_junit(&tests);
}
