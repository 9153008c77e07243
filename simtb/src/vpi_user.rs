//! Hand-declared subset of the IEEE-1364 VPI interface. Only the entry
//! points and constants the harness actually uses are bound; the symbols
//! are resolved by the host simulator when it loads the testbench library.

#![allow(non_camel_case_types, non_upper_case_globals, dead_code)]

use std::os::raw::{c_char, c_int, c_uint};

pub type PLI_INT32 = c_int;
pub type PLI_UINT32 = c_uint;
pub type PLI_BYTE8 = c_char;
pub type vpiHandle = *mut PLI_UINT32;

// callback reasons
pub const cbValueChange: u32 = 1;
pub const cbReadWriteSynch: u32 = 6;
pub const cbReadOnlySynch: u32 = 7;
pub const cbAfterDelay: u32 = 9;
pub const cbStartOfSimulation: u32 = 11;
pub const cbEndOfSimulation: u32 = 12;

// object properties
pub const vpiType: u32 = 1;
pub const vpiName: u32 = 2;
pub const vpiFullName: u32 = 3;
pub const vpiSize: u32 = 4;
pub const vpiTimePrecision: u32 = 12;

// object type codes
pub const vpiIntegerVar: u32 = 25;
pub const vpiModule: u32 = 32;
pub const vpiNet: u32 = 36;
pub const vpiParameter: u32 = 41;
pub const vpiRealVar: u32 = 47;
pub const vpiReg: u32 = 48;

// SystemVerilog object type codes (sv_vpi_user.h)
pub const vpiLongIntVar: u32 = 610;
pub const vpiIntVar: u32 = 612;
pub const vpiShortRealVar: u32 = 613;
pub const vpiBitVar: u32 = 620;

// value formats
pub const vpiBinStrVal: u32 = 1;
pub const vpiScalarVal: u32 = 5;
pub const vpiIntVal: u32 = 6;
pub const vpiRealVal: u32 = 7;
pub const vpiSuppressVal: u32 = 13;

// time types
pub const vpiScaledRealTime: u32 = 1;
pub const vpiSimTime: u32 = 2;
pub const vpiSuppressTime: u32 = 3;

// vpi_put_value flags
pub const vpiNoDelay: u32 = 1;
pub const vpiInertialDelay: u32 = 2;
pub const vpiForceFlag: u32 = 5;
pub const vpiReleaseFlag: u32 = 6;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct t_vpi_time {
    pub type_: PLI_INT32,
    pub high: PLI_UINT32,
    pub low: PLI_UINT32,
    pub real: f64,
}

impl Default for t_vpi_time {
    fn default() -> Self {
        Self {
            type_: 0,
            high: 0,
            low: 0,
            real: 0.0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union t_vpi_value_union {
    pub str_: *mut PLI_BYTE8,
    pub scalar: PLI_INT32,
    pub integer: PLI_INT32,
    pub real: f64,
    pub time: *mut t_vpi_time,
    pub misc: *mut PLI_BYTE8,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct t_vpi_value {
    pub format: PLI_INT32,
    pub value: t_vpi_value_union,
}

impl Default for t_vpi_value {
    fn default() -> Self {
        Self {
            format: 0,
            value: t_vpi_value_union { integer: 0 },
        }
    }
}

#[repr(C)]
pub struct t_cb_data {
    pub reason: PLI_INT32,
    pub cb_rtn: Option<unsafe extern "C" fn(cb_data: *mut t_cb_data) -> PLI_INT32>,
    pub obj: vpiHandle,
    pub time: *mut t_vpi_time,
    pub value: *mut t_vpi_value,
    pub index: PLI_INT32,
    pub user_data: *mut PLI_BYTE8,
}

impl Default for t_cb_data {
    fn default() -> Self {
        Self {
            reason: 0,
            cb_rtn: None,
            obj: std::ptr::null_mut(),
            time: std::ptr::null_mut(),
            value: std::ptr::null_mut(),
            index: 0,
            user_data: std::ptr::null_mut(),
        }
    }
}

extern "C" {
    pub fn vpi_register_cb(cb_data_p: *mut t_cb_data) -> vpiHandle;
    pub fn vpi_remove_cb(cb_obj: vpiHandle) -> PLI_INT32;
    pub fn vpi_get(property: PLI_INT32, object: vpiHandle) -> PLI_INT32;
    pub fn vpi_get_str(property: PLI_INT32, object: vpiHandle) -> *mut PLI_BYTE8;
    pub fn vpi_get_value(expr: vpiHandle, value_p: *mut t_vpi_value);
    pub fn vpi_put_value(
        object: vpiHandle,
        value_p: *mut t_vpi_value,
        time_p: *mut t_vpi_time,
        flags: PLI_INT32,
    ) -> vpiHandle;
    pub fn vpi_get_time(object: vpiHandle, time_p: *mut t_vpi_time);
    pub fn vpi_handle_by_name(name: *mut PLI_BYTE8, scope: vpiHandle) -> vpiHandle;
    pub fn vpi_iterate(type_: PLI_INT32, ref_handle: vpiHandle) -> vpiHandle;
    pub fn vpi_scan(iterator: vpiHandle) -> vpiHandle;
    pub fn vpi_free_object(object: vpiHandle) -> PLI_INT32;
    pub fn vpi_printf(format: *const PLI_BYTE8, ...) -> PLI_INT32;
}
