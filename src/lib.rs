//! Yatube: a small community blog with groups, comments, follows and a
//! cached home feed.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
