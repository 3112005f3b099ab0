//! 结果录入会话
//!
//! 批量录入不在内存里攒整批：操作员每切换一个样本就落盘一个样本，
//! 中途断线最多丢失当前打开样本的未保存修改。每个样本有自己的
//! 保存小状态机：Editing -> Saving -> Saved，保存失败退回 Editing。

use lims_core::{LimsError, Result};
use std::collections::HashMap;
use uuid::Uuid;

/// 单样本的录入保存状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Editing,
    Saving,
    Saved,
}

/// 一次批量录入的会话
#[derive(Debug)]
pub struct ResultEntrySession {
    states: HashMap<Uuid, EntryState>,
}

impl ResultEntrySession {
    /// 为整批样本开启会话，全部处于 Editing
    pub fn begin(sample_ids: &[Uuid]) -> Self {
        Self {
            states: sample_ids
                .iter()
                .map(|id| (*id, EntryState::Editing))
                .collect(),
        }
    }

    pub fn state(&self, sample_id: Uuid) -> Option<EntryState> {
        self.states.get(&sample_id).copied()
    }

    /// Editing -> Saving
    pub fn mark_saving(&mut self, sample_id: Uuid) -> Result<()> {
        self.advance(sample_id, EntryState::Editing, EntryState::Saving)
    }

    /// Saving -> Saved
    pub fn mark_saved(&mut self, sample_id: Uuid) -> Result<()> {
        self.advance(sample_id, EntryState::Saving, EntryState::Saved)
    }

    /// 保存失败：Saving 退回 Editing，已保存的样本不受影响
    pub fn mark_failed(&mut self, sample_id: Uuid) -> Result<()> {
        self.advance(sample_id, EntryState::Saving, EntryState::Editing)
    }

    /// 尚未保存完成的样本
    pub fn unsaved(&self) -> Vec<Uuid> {
        self.states
            .iter()
            .filter(|(_, state)| **state != EntryState::Saved)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.states.values().all(|s| *s == EntryState::Saved)
    }

    fn advance(&mut self, sample_id: Uuid, from: EntryState, to: EntryState) -> Result<()> {
        let state = self
            .states
            .get_mut(&sample_id)
            .ok_or_else(|| LimsError::NotFound(format!("样本 {} 不在本次录入会话中", sample_id)))?;
        if *state != from {
            return Err(LimsError::InvalidTransition {
                from: format!("{:?}", state),
                event: format!("{:?}", to),
            });
        }
        *state = to;
        Ok(())
    }
}
