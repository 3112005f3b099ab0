//! # LIMS工作流模块
//!
//! 提供诊断检验医嘱从采集到发布的完整工作流管理，包括：
//! - 参考范围评估器：数值结果按年龄/性别限定范围计算严重程度标志
//! - 样本状态机：管理单个样本的完整生命周期状态转换
//! - 就诊聚合器：把共享同一医嘱的样本集合实时汇总为一个工作单元
//! - 危急值追踪器：管理危急结果的沟通确认闭环
//! - 结果录入会话：批量录入按样本逐个落盘的保存协议

pub mod critical;
pub mod engine;
pub mod reference_range;
pub mod result_entry;
pub mod state_machine;
pub mod visit;

// 重新导出主要类型
pub use critical::CriticalResultTracker;
pub use engine::WorkflowEngine;
pub use reference_range::evaluate;
pub use result_entry::{EntryState, ResultEntrySession};
pub use state_machine::{SampleEvent, SampleStateMachine};
pub use visit::{Visit, VisitStatus};
