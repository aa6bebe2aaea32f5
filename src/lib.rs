#![allow(dead_code)]
#![allow(unused_variables)]
#![allow(unused_imports)]

#[macro_use]
extern crate rbatis;

pub mod app_config;
pub mod error;
pub mod job;
pub mod time_util;
pub mod trading;
