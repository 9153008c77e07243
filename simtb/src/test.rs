use crate::signal::SimObject;
use crate::tb_obj::TbObjSafe;
use crate::value::Val;
use crate::TbResult;
use futures::future::BoxFuture;
use lazy_static::lazy_static;

#[derive(Debug)]
pub struct TbTests(Vec<TbObjSafe<Test>>);

impl TbTests {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Vec::new())
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> core::slice::Iter<TbObjSafe<Test>> {
        self.0.iter()
    }
    pub fn push(&mut self, test: Test) {
        self.0.push(TbObjSafe::new(test));
    }
}

#[derive(Debug)]
pub struct Test {
    pub name: String,
    pub generator: fn(SimObject) -> BoxFuture<'static, TbResult>,
    pub result: Option<TbResult>,
    pub time_secs: f64,
    pub sim_time_ns: f64,
}

impl Test {
    pub fn new(name: String, generator: fn(SimObject) -> BoxFuture<'static, TbResult>) -> Self {
        Self {
            name,
            generator,
            result: None,
            time_secs: 0.0,
            sim_time_ns: 0.0,
        }
    }
    pub fn set_result(&mut self, result: TbResult) {
        self.result = Some(result);
    }
}

impl std::fmt::Debug for TbObjSafe<Test> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", *self.get())
    }
}

lazy_static! {
    // Replaced at the start of every simulation run, so the model backend
    // can execute several runs in one process.
    static ref TESTS: TbObjSafe<Option<TbTests>> = TbObjSafe::new(None);
}

pub(crate) fn set_tests(tests: TbTests) {
    TESTS.with_mut(|t| {
        let _ = t.replace(tests);
    });
}

pub(crate) fn registered_tests() -> Vec<TbObjSafe<Test>> {
    TESTS.with_mut(|t| {
        t.as_ref()
            .map(|tests| tests.iter().cloned().collect())
            .unwrap_or_default()
    })
}

pub(crate) fn all_tests_resolved() -> bool {
    registered_tests().iter().all(|t| t.get().result.is_some())
}

pub(crate) fn collect_results() -> Vec<(String, TbResult)> {
    registered_tests()
        .iter()
        .map(|t| {
            let t = t.get();
            let result = t
                .result
                .clone()
                .unwrap_or_else(|| Err(Val::String("test did not complete".to_string())));
            (t.name.clone(), result)
        })
        .collect()
}
