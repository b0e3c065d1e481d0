//! 被驱动 App 的界面标记
//!
//! 资源 id 一律写完整形式，文本标记按界面原文。

use serde::{Deserialize, Serialize};

use crate::infrastructure::screen::Locator;

const ID_PREFIX: &str = "com.yikaobang.yixue:id/";

fn rid(name: &str) -> String {
    format!("{}{}", ID_PREFIX, name)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    // --- 详情页 ---
    /// 轮播中每一页的内容容器
    pub content_container: String,
    pub course_title: String,
    pub unit_title: String,
    pub page_number: String,
    pub mode: String,
    pub stem: String,
    pub option: String,
    pub answer: String,
    pub key_point: String,
    pub discussion: String,
    pub statistics: String,
    /// 多子题的 Tab 标签
    pub tab: String,

    // --- 列表页 ---
    pub list_item: String,
    /// 题号格子上的辅助图标
    pub list_item_icon: String,
    pub list_grid: String,
    pub filter_label: String,
    pub filter_all_text: String,
    pub filter_recite_text: String,
    /// 筛选面板展开时出现的标记
    pub loading_marker: String,
    pub back_button: String,

    // --- 章节切换 ---
    pub next_chapter: String,
    pub popup: String,
    pub chapter_title: String,

    // --- 弹层与重置 ---
    pub ad_close_id: String,
    pub ad_close_texts: Vec<String>,
    /// 重启后首页的稳定标记文本
    pub baseline_text: String,
    pub refresh_text: String,
    pub force_stop_texts: Vec<String>,
    pub confirm_texts: Vec<String>,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            content_container: rid("questiondetails_scrollview"),
            course_title: rid("include_title_center"),
            unit_title: rid("questiondetails_tv_title"),
            page_number: rid("pagenumtv"),
            mode: rid("typeStr"),
            stem: rid("titletv"),
            option: rid("QuestionOptions_item_tv_content"),
            answer: rid("questiondetails_tv_Answer"),
            key_point: rid("questiondetails_tv_content_ques1"),
            discussion: rid("questiondetails_tv_contents"),
            statistics: rid("questiondetails_tv_statistics"),
            tab: rid("tv_column_name"),
            list_item: rid("questionList_item_tv"),
            list_item_icon: rid("questionList_item_iv"),
            list_grid: rid("questionList_GridView"),
            filter_label: rid("labeltext"),
            filter_all_text: "全部".to_string(),
            filter_recite_text: "背题模式".to_string(),
            loading_marker: rid("openrel"),
            back_button: rid("include_btn_left"),
            next_chapter: rid("tv_next"),
            popup: rid("centerPopupContainer"),
            chapter_title: rid("txt_actionbar_title"),
            ad_close_id: "close".to_string(),
            ad_close_texts: vec!["关闭".to_string(), "跳过".to_string()],
            baseline_text: "错题".to_string(),
            refresh_text: "点击刷新页面".to_string(),
            force_stop_texts: vec![
                "强行停止".to_string(),
                "结束运行".to_string(),
                "强制停止".to_string(),
            ],
            confirm_texts: vec!["确定".to_string(), "确认".to_string()],
        }
    }
}

impl Selectors {
    /// 一组精确文本的定位条件
    pub fn by_texts(texts: &[String]) -> Vec<Locator> {
        texts.iter().map(|t| Locator::text(t.as_str())).collect()
    }
}
