#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 为单个 3D CT 病例提供分割标签的交互式编辑内核.
//!
//! 浏览器端把鼠标/触控笔的轨迹 (stroke) 以图像像素坐标发送过来, 本 crate
//! 负责把它们光栅化到某一层水平切片上, 记录体素级别的差分, 并支持撤销/重做
//! 以及编辑日志的持久化与重放.
//!
//! HTTP 路由层不在本 crate 内, 它只需要持有一个 [`EditorSession`]
//! (或并发场景下的 [`SessionHandle`]) 并调用其方法即可.
//!
//! # 注意
//!
//! 1. 一个进程只编辑一个标签体 (单文档模型), 每次编辑只作用于一层切片.
//! 2. 内存中的状态始终是权威的: 持久化失败不会影响正在运行的会话.
//!
//! # 开发计划
//!
//! ### 画笔 / 橡皮擦光栅化 ✅
//!
//! 相邻采样点之间做线性插值, 每个插值点盖一个方形笔刷, 越界部分被裁剪.
//!
//! 实现位于 `ct-scribe/src/edit/raster.rs`.
//!
//! ### 套索填充 ✅
//!
//! 以体素中心为采样点的奇偶扫描线填充, 并额外光栅化多边形轮廓,
//! 保证边上的体素也被包含.
//!
//! 实现位于 `ct-scribe/src/edit/raster.rs`.
//!
//! ### 撤销 / 重做日志 ✅
//!
//! 每次编辑记录一层切片上的稀疏差分. 线性时间线: 新的编辑会清空重做栈.
//!
//! 实现位于 `ct-scribe/src/edit/history.rs`.
//!
//! ### 日志持久化 ✅
//!
//! 以 CSR 风格打包为一个压缩 npz 文件, 与 numpy `savez_compressed` 互通.
//! 会话启动时自动重放.
//!
//! ### 数据加载与切片渲染 ✅
//!
//! npy 体数据, `labels.json` 标签表, 以及 CT 灰度 / 标签叠加层的 PNG 编码.
//!
//! 实现位于 `ct-scribe/src/dataset`, `ct-scribe/src/render.rs`.
//!
//! ### 撤销深度上限 ⌛️
//!
//! 目前撤销栈不设上限. 淘汰最旧的操作会破坏 "基础标签 + 日志重放"
//! 的一致性, 需要先支持把被淘汰的操作合并进基础标签文件.

/// 二维索引 (高, 宽), 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引 (z, 高, 宽).
pub type Idx3d = (usize, usize, usize);

/// 标签值类型. `0` 代表未标注的背景.
pub type LabelId = i16;

/// 高精度二维坐标 (x, y), 即图像像素坐标系下的 (列, 行).
pub type Point2d = (f64, f64);

/// 3D 体数据及其水平切片.
mod data;

pub use data::slice::{LabelMirror, LabelSlice, LabelSliceMut, OwnedLabelSlice};
pub use data::window::CtWindow;
pub use data::{ScanVolume, SegVolume, VolumeShape};

pub mod catalog;
pub mod consts;
pub mod dataset;
pub mod edit;
pub mod prelude;
pub mod render;
pub mod session;

pub use catalog::{LabelCatalog, LabelEntry, LabelInfo};
pub use session::{EditorSession, SessionHandle};
