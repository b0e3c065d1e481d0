//! 爬取上下文
//!
//! 封装"我爬到哪了、卡了几次、失败了几次"这些信息。
//! 只由状态机修改，重置流程只读。

use std::fmt::Display;

use crate::models::position::PagePosition;
use crate::models::question::QuestionDocument;

/// 最近一次保存的记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedRecord {
    pub position: PagePosition,
    /// 保存后得到的引用（文件路径）
    pub reference: String,
}

/// 爬取状态
#[derive(Debug, Clone, Default)]
pub struct CrawlState {
    /// 最近一次处理过的位置（保存或跳过都算）
    pub last_position: Option<PagePosition>,
    pub last_record: Option<SavedRecord>,
    /// 同一位置连续出现的次数
    pub stall_count: usize,
    /// 连续失败次数
    pub failure_count: usize,
    pub saved_count: usize,
    pub skipped_count: usize,
    pub resets: usize,
    /// 最近一次成功保存之后的重置次数
    pub consecutive_resets: usize,
    pub current_chapter: String,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从已落盘的文档恢复位置
    pub fn resume_from(document: &QuestionDocument, reference: impl Into<String>) -> Self {
        let position = document.record.position();
        Self {
            last_position: Some(position.clone()),
            last_record: Some(SavedRecord {
                position,
                reference: reference.into(),
            }),
            ..Self::default()
        }
    }

    /// 当前位置是否与上一次相同
    pub fn is_repeat(&self, position: &PagePosition) -> bool {
        self.last_position.as_ref() == Some(position)
    }

    /// 单元变化时清空上次位置，新单元的 1/n 不算卡住
    pub fn observe_unit(&mut self, position: &PagePosition) -> bool {
        let changed = match &self.last_position {
            Some(last) => {
                position.unit.is_some() && !last.unit_or_empty().is_empty() && !last.same_unit(position)
            }
            None => false,
        };
        if changed {
            self.last_position = None;
        }
        changed
    }

    pub fn note_saved(&mut self, position: PagePosition, reference: String) {
        self.last_position = Some(position.clone());
        self.last_record = Some(SavedRecord {
            position,
            reference,
        });
        self.saved_count += 1;
        self.failure_count = 0;
        self.consecutive_resets = 0;
    }

    /// 记录无法补全的题目，标记为已访问避免反复重试
    pub fn note_skipped(&mut self, position: PagePosition) {
        self.last_position = Some(position);
        self.skipped_count += 1;
        self.failure_count += 1;
    }

    /// 进入新单元后清空位置
    pub fn clear_position(&mut self) {
        self.last_position = None;
        self.stall_count = 0;
    }

    /// 重置完成后清零计数
    pub fn after_reset(&mut self) {
        self.failure_count = 0;
        self.stall_count = 0;
    }

    /// 重置时要导航回去的位置：优先最近保存的记录
    pub fn resume_target(&self) -> Option<&PagePosition> {
        self.last_record
            .as_ref()
            .map(|r| &r.position)
            .or(self.last_position.as_ref())
    }
}

impl Display for CrawlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[已保存 {} | 跳过 {} | 失败 {} | 卡住 {} | 重置 {}]",
            self.saved_count, self.skipped_count, self.failure_count, self.stall_count, self.resets
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(unit: &str, no: &str) -> PagePosition {
        PagePosition::new("内科学", Some(unit.to_string()), no)
    }

    #[test]
    fn test_unit_change_clears_last_position() {
        let mut state = CrawlState::new();
        state.note_saved(pos("第一章", "20/20"), "a.json".to_string());

        assert!(!state.observe_unit(&pos("第一章", "20/20")));
        assert!(state.is_repeat(&pos("第一章", "20/20")));

        assert!(state.observe_unit(&pos("第二章", "1/15")));
        assert_eq!(state.last_position, None);
        // 恢复目标仍然是最近保存的那条
        assert_eq!(state.resume_target(), Some(&pos("第一章", "20/20")));
    }

    #[test]
    fn test_saved_and_skipped_counters() {
        let mut state = CrawlState::new();
        state.failure_count = 3;
        state.consecutive_resets = 2;

        state.note_saved(pos("第一章", "1/3"), "a.json".to_string());
        assert_eq!((state.saved_count, state.failure_count, state.consecutive_resets), (1, 0, 0));

        state.note_skipped(pos("第一章", "2/3"));
        assert_eq!((state.skipped_count, state.failure_count), (1, 1));
        assert!(state.is_repeat(&pos("第一章", "2/3")));
    }
}
