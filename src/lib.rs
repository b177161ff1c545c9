//! 粒子数据集 -> 三维密度立方体
//!
//! 将带光滑长度 h 的散点粒子以高斯核溅射到 R³ 规则网格上，
//! 并提供按局部/世界坐标采样的接口，供触觉反馈使用。

pub mod app_state;
pub mod config;
pub mod dataset;
pub mod error;
pub mod field;
pub mod handlers;
pub mod kernel;
pub mod parsers;
pub mod performance;
pub mod probe;
pub mod rasterizer;
pub mod rebuild;
pub mod routes;
pub mod task;
pub mod utils;
