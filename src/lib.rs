pub mod config;
pub mod domain;
pub mod error;
pub mod formats;
pub mod ftp;
pub mod http;
pub mod metabobank;
pub mod metabolights;
pub mod output;
pub mod pipeline;
pub mod repository;
pub mod store;
pub mod workbench;
