#![deny(dead_code)]
#![deny(unused_imports)]

pub mod config;
pub mod seeding;

#[path = "../cohort/mod.rs"]
pub mod cohort;

#[path = "../evaluate/mod.rs"]
pub mod evaluate;
