use crate::sim_if::SIM_IF;
use crate::tb_obj::TbObjSafe;
use crate::test::Test;
use prettytable::{Cell, Row, Table};

pub(crate) fn print_summary(tests: &[TbObjSafe<Test>]) {
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Test"),
        Cell::new("Result"),
        Cell::new("Time [s]"),
        Cell::new("SimTime [ns]"),
        Cell::new("Speed [ns/s]"),
    ]));
    for test in tests {
        let (name, result_str, time, sim_time) = {
            let t = test.get();
            (
                t.name.clone(),
                match t.result.as_ref() {
                    Some(Ok(_)) => "passed",
                    _ => "failed",
                },
                t.time_secs,
                t.sim_time_ns,
            )
        };
        let sim_speed = if time > 0.0 { sim_time / time } else { 0.0 };
        table.add_row(Row::new(vec![
            Cell::new(&name),
            Cell::new(result_str),
            Cell::new(&format!("{:.3}", time)),
            Cell::new(&format!("{}", sim_time)),
            Cell::new(&format!("{:.3}", sim_speed)),
        ]));
    }
    for line in table.to_string().lines() {
        SIM_IF.log(line);
    }
}

#[cfg(feature = "vpi")]
pub(crate) fn write_junit(tests: &[TbObjSafe<Test>]) {
    use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};

    let mut test_cases = Vec::new();
    for t in tests.iter().map(|obj| obj.get()) {
        let tc = match t.result.as_ref() {
            Some(Ok(_)) => TestCaseBuilder::success(&t.name, Duration::seconds_f64(t.time_secs)),
            Some(Err(e)) => TestCaseBuilder::failure(
                &t.name,
                Duration::seconds_f64(t.time_secs),
                "failure",
                &format!("{:?}", e),
            ),
            None => TestCaseBuilder::failure(
                &t.name,
                Duration::seconds_f64(0.0),
                "failure",
                "test did not run",
            ),
        }
        .build();
        test_cases.push(tc);
    }

    let suite_name = crate::CRATE_NAME.get().map(String::as_str).unwrap_or("testbench");
    let test_suite = TestSuiteBuilder::new(suite_name)
        .add_testcases(test_cases)
        .build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    match std::fs::File::create("results.xml") {
        Ok(file) => {
            if report.write_xml(file).is_err() {
                SIM_IF.log("Failed to write results.xml");
            }
        }
        Err(_) => SIM_IF.log("Failed to create results.xml"),
    }
}
