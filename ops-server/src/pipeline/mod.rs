//! 摄像头流水线
//!
//! 抓帧 → 裁剪 → 分类器派发 → 桌台状态机，每摄像头一个并发 worker：
//!
//! - [`frame_source`]: 按 URI scheme 抓帧（file / http / rtsp stub）
//! - [`crop`]: 旋转框 → 轴对齐裁剪（确定性，无 I/O）
//! - [`dispatcher`]: 派发到分类器（在途上限、指数退避重试、幂等去重）
//! - [`worker`]: 单摄像头采样循环（跳过错过的 tick）
//! - [`supervisor`]: worker 生命周期（注册表变更、暂停/恢复、关机）

pub mod crop;
pub mod dispatcher;
pub mod frame_source;
pub mod supervisor;
pub mod worker;

pub use crop::{extract_crops, CropWarning, TableCrop};
pub use dispatcher::{ClassifierDispatcher, ClassifierTransport, CropSubmission, SubmitOutcome};
pub use frame_source::{Frame, FrameError, FrameSource};
pub use supervisor::CameraSupervisor;
pub use worker::CameraWorker;
