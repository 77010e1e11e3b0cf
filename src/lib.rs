// ABOUTME: Library module for pg-catalog-dump
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod catalog;
pub mod commands;
pub mod config;
pub mod dump;
pub mod postgres;
pub mod utils;
