//! 题目提取服务 - 业务能力层
//!
//! 只从当前页（活动视口）读取字段，组装单题或多子题记录。
//!
//! 职责：
//! - 读取课程 / 单元 / 题号，判断页面是否就绪
//! - 单题：题干、选项、答案、正确率、考点、解析
//! - 多子题：共享题干 + 逐个 Tab 切换读取子题
//! - 不判断记录是否完整，不保存，不翻页

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{Config, Gestures, Layout, Timings};
use crate::error::CrawlError;
use crate::infrastructure::screen::{Bounds, Element, Locator, Screen};
use crate::infrastructure::wait::{poll_until, wait_until, Condition};
use crate::models::position::PagePosition;
use crate::models::question::{MultiPartQuestion, QuestionRecord, SingleQuestion, SubPart};
use crate::services::viewport::{Scope, ViewportResolver};
use crate::utils::truncate_text;

/// 答案文本可能带的前缀
const ANSWER_PREFIXES: [&str; 3] = ["答案：", "答案:", "Answer:"];

/// 答案与正确率的文本解析
pub struct FieldParser {
    answer_re: Regex,
    accuracy_re: Regex,
}

impl FieldParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            answer_re: Regex::new(r"(?:正确答案|Correct answer)\s*[:：]?\s*([A-Z]+)")
                .context("答案正则编译失败")?,
            accuracy_re: Regex::new(r"(?:正确率|correct-rate)\s*[:：]?\s*(\d+(?:\.\d+)?)%")
                .context("正确率正则编译失败")?,
        })
    }

    /// 去掉前缀后匹配"正确答案 XX"，匹配到返回字母，否则原样返回
    pub fn parse_answer(&self, raw: &str) -> String {
        let mut text = raw.trim();
        for prefix in ANSWER_PREFIXES {
            if let Some(rest) = text.strip_prefix(prefix) {
                text = rest.trim();
                break;
            }
        }

        match self.answer_re.captures(text) {
            Some(caps) => caps[1].to_string(),
            None => text.to_string(),
        }
    }

    /// 取正确率标签后的第一个百分数
    ///
    /// 统计块里可能同时有总体和个人正确率，只保留第一个匹配。
    pub fn parse_accuracy(&self, text: &str) -> Option<String> {
        self.accuracy_re
            .captures(text)
            .map(|caps| format!("{}%", &caps[1]))
    }
}

/// 一问（或单题）的作答相关字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PartFields {
    options: Vec<String>,
    answer: Option<String>,
    accuracy: String,
    key_point: String,
    discussion: String,
}

struct FieldLocators {
    course: Locator,
    unit: Locator,
    page_number: Locator,
    mode: Locator,
    stem: Locator,
    option: Locator,
    answer: Locator,
    key_point: Locator,
    discussion: Locator,
    statistics: Locator,
    tab: Locator,
}

/// 题目提取器
pub struct QuestionExtractor {
    locators: FieldLocators,
    viewport: ViewportResolver,
    parser: FieldParser,
    timings: Timings,
    gestures: Gestures,
    layout: Layout,
    course_retries: usize,
}

impl QuestionExtractor {
    pub fn new(config: &Config) -> Result<Self> {
        let s = &config.selectors;
        Ok(Self {
            locators: FieldLocators {
                course: Locator::id(s.course_title.as_str()),
                unit: Locator::id(s.unit_title.as_str()),
                page_number: Locator::id(s.page_number.as_str()),
                mode: Locator::id(s.mode.as_str()),
                stem: Locator::id(s.stem.as_str()),
                option: Locator::id(s.option.as_str()),
                answer: Locator::id(s.answer.as_str()),
                key_point: Locator::id(s.key_point.as_str()),
                discussion: Locator::id(s.discussion.as_str()),
                statistics: Locator::id(s.statistics.as_str()),
                tab: Locator::id(s.tab.as_str()),
            },
            viewport: ViewportResolver::new(&s.content_container),
            parser: FieldParser::new()?,
            timings: config.timings.clone(),
            gestures: config.gestures.clone(),
            layout: config.layout.clone(),
            course_retries: config.course_retries.max(1),
        })
    }

    pub fn viewport(&self) -> &ViewportResolver {
        &self.viewport
    }

    /// 等待题干出现在屏幕范围内
    pub async fn wait_for_page<S: Screen>(&self, screen: &S, timeout_ms: u64) -> Result<bool> {
        poll_until(screen, timeout_ms, self.timings.poll_ms, || async {
            let stems = self
                .viewport
                .query(screen, &self.locators.stem, Scope::Global)
                .await?;
            Ok::<_, anyhow::Error>(!stems.is_empty())
        })
        .await
    }

    /// 课程名，有限次重试后仍缺失则报必需元素缺失
    async fn read_course<S: Screen>(&self, screen: &S) -> Result<String> {
        for attempt in 1..=self.course_retries {
            let present = wait_until(
                screen,
                Condition::Present(&self.locators.course),
                self.timings.course_wait_ms,
                self.timings.poll_ms,
            )
            .await?;

            if present {
                let course = screen
                    .find(&self.locators.course)
                    .await?
                    .iter()
                    .find_map(|e| e.non_empty_text().map(str::to_string));
                if let Some(course) = course {
                    return Ok(course);
                }
            }
            warn!("未找到课程名 ({}/{})", attempt, self.course_retries);
        }
        Err(CrawlError::exhausted("课程名").into())
    }

    /// 读取当前逻辑位置；题号缺失说明页面还没就绪，返回 `None`
    pub async fn read_position<S: Screen>(&self, screen: &S) -> Result<Option<PagePosition>> {
        let course = self.read_course(screen).await?;
        let unit = self
            .viewport
            .first_text(screen, &self.locators.unit, Scope::Global)
            .await?;

        let number = self
            .viewport
            .query(screen, &self.locators.page_number, Scope::Global)
            .await?
            .first()
            .and_then(|e| e.text())
            .map(|t| t.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            .filter(|n| !n.is_empty());

        Ok(number.map(|number| PagePosition::new(course, unit, number)))
    }

    /// 提取当前页题目
    pub async fn extract<S: Screen>(&self, screen: &S) -> Result<QuestionRecord> {
        let vp = self.require_viewport(screen).await?;
        let position = self
            .read_position(screen)
            .await?
            .ok_or_else(|| CrawlError::transient("题号"))?;
        let mode = self
            .viewport
            .first_text(screen, &self.locators.mode, Scope::Pane(vp))
            .await?;

        let tabs = self.tabs(screen, vp).await?;
        info!(
            "  检测题型: {} | 多子题: {}",
            mode.as_deref().unwrap_or("?"),
            !tabs.is_empty()
        );

        if tabs.is_empty() {
            self.extract_single(screen, vp, position, mode).await
        } else {
            self.extract_multi(screen, vp, tabs, position, mode).await
        }
    }

    async fn require_viewport<S: Screen>(&self, screen: &S) -> Result<Bounds> {
        self.viewport
            .active_viewport(screen)
            .await?
            .ok_or_else(|| CrawlError::transient("内容容器").into())
    }

    /// 当前页内的 Tab，按从左到右排序
    async fn tabs<S: Screen>(&self, screen: &S, vp: Bounds) -> Result<Vec<Element>> {
        let mut tabs = self
            .viewport
            .query(screen, &self.locators.tab, Scope::Pane(vp))
            .await?;
        tabs.sort_by_key(|t| t.bounds.center_x());
        Ok(tabs)
    }

    async fn extract_single<S: Screen>(
        &self,
        screen: &S,
        vp: Bounds,
        position: PagePosition,
        mode: Option<String>,
    ) -> Result<QuestionRecord> {
        let stem = self
            .viewport
            .first_text(screen, &self.locators.stem, Scope::Pane(vp))
            .await?;
        let fields = self.read_part_fields(screen, vp).await?;

        info!("  [{}] {}", mode.as_deref().unwrap_or("?"), position.question_number);
        info!("  题目: {}", truncate_text(stem.as_deref().unwrap_or_default(), 60));
        info!(
            "  选项数: {} | 答案: {}",
            fields.options.len(),
            fields.answer.as_deref().unwrap_or("无")
        );

        Ok(QuestionRecord::Single(SingleQuestion {
            course: position.course,
            no: position.question_number,
            unit: position.unit,
            mode,
            stem,
            options: fields.options,
            answer: fields.answer,
            accuracy: fields.accuracy,
            key_point: fields.key_point,
            discussion: fields.discussion,
        }))
    }

    async fn extract_multi<S: Screen>(
        &self,
        screen: &S,
        vp: Bounds,
        tabs: Vec<Element>,
        position: PagePosition,
        mode: Option<String>,
    ) -> Result<QuestionRecord> {
        let row = tab_row(&tabs).unwrap_or(Bounds::new(
            vp.left,
            self.layout.tab_fallback_top,
            vp.right,
            self.layout.tab_fallback_bottom,
        ));
        let shared_stem = self
            .viewport
            .query(screen, &self.locators.stem, Scope::Pane(vp))
            .await?
            .iter()
            .filter(|e| e.bounds.bottom <= row.top)
            .find_map(|e| e.non_empty_text().map(str::to_string))
            .unwrap_or_default();

        let labels: Vec<String> = tabs
            .iter()
            .enumerate()
            .map(|(i, t)| {
                t.non_empty_text()
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|| format!("第{}问", i + 1))
            })
            .collect();

        info!("  [{}] {}", mode.as_deref().unwrap_or("?"), position.question_number);
        info!("  共享题干: {}", truncate_text(&shared_stem, 60));
        info!("  子题数: {}", labels.len());

        let mut parts = Vec::with_capacity(labels.len());
        for (index, label) in labels.iter().enumerate() {
            info!("  --- {} ({}/{}) ---", label, index + 1, labels.len());

            if index > 0 {
                self.switch_tab(screen, index, label).await?;
            }
            screen.idle(self.timings.tab_settle_ms).await;

            // 滚动一次让答案、解析等懒加载内容挂载，再回到顶部
            self.gestures.pane_scroll_down.perform(screen).await?;
            screen.idle(self.timings.tab_settle_ms).await;
            self.gestures.pane_scroll_up.perform(screen).await?;
            screen.idle(self.timings.tab_settle_ms).await;

            // 切换后界面树可能重建，重新解析视口
            let vp = self.require_viewport(screen).await?;
            let current_tabs = self.tabs(screen, vp).await?;
            let Some(row) = tab_row(&current_tabs) else {
                warn!("  ✗ 切换后未找到子题 Tab，回退到单题模式");
                return self.extract_single(screen, vp, position, mode).await;
            };

            let stem = self
                .viewport
                .query(screen, &self.locators.stem, Scope::Pane(vp))
                .await?
                .iter()
                .filter(|e| e.bounds.top >= row.bottom)
                .find_map(|e| e.non_empty_text().map(str::to_string))
                .unwrap_or_default();
            let fields = self.read_part_fields(screen, vp).await?;

            info!("    子题: {}", truncate_text(&stem, 50));
            info!(
                "    选项数: {} | 答案: {} | 正确率: {}",
                fields.options.len(),
                fields.answer.as_deref().unwrap_or("无"),
                fields.accuracy
            );

            parts.push(SubPart {
                label: label.clone(),
                stem,
                options: fields.options,
                answer: fields.answer,
                accuracy: fields.accuracy,
                key_point: fields.key_point,
                discussion: fields.discussion,
            });
        }

        info!("  子题采集完成: {}/{}", parts.len(), labels.len());

        Ok(QuestionRecord::MultiPart(MultiPartQuestion {
            course: position.course,
            no: position.question_number,
            unit: position.unit,
            mode,
            shared_stem,
            parts,
        }))
    }

    /// 直接点击目标 Tab；找不到或点击未被接受时退回滑动切换
    async fn switch_tab<S: Screen>(&self, screen: &S, index: usize, label: &str) -> Result<()> {
        let vp = self.require_viewport(screen).await?;
        let tabs = self.tabs(screen, vp).await?;
        let target = tabs
            .iter()
            .find(|t| t.text().map(str::trim) == Some(label))
            .or_else(|| tabs.get(index));

        if let Some(tab) = target {
            if screen.click(tab).await? {
                debug!("  点击切换到 {}", label);
                return Ok(());
            }
        }

        warn!("  点击 Tab {} 失败，改用滑动切换", label);
        self.gestures.tab_switch.perform(screen).await
    }

    async fn read_part_fields<S: Screen>(&self, screen: &S, vp: Bounds) -> Result<PartFields> {
        let scope = Scope::Pane(vp);

        let mut option_elements = self
            .viewport
            .query(screen, &self.locators.option, scope)
            .await?;
        option_elements.sort_by_key(|e| e.bounds.center_y());
        let options = option_elements
            .iter()
            .filter_map(|e| e.non_empty_text().map(str::to_string))
            .collect();

        let answer = self
            .viewport
            .first_text(screen, &self.locators.answer, scope)
            .await?
            .map(|raw| self.parser.parse_answer(&raw));

        let accuracy = self
            .viewport
            .query(screen, &self.locators.statistics, scope)
            .await?
            .iter()
            .filter_map(|e| e.text())
            .find_map(|t| self.parser.parse_accuracy(t))
            .unwrap_or_default();

        let key_point = self
            .viewport
            .first_text(screen, &self.locators.key_point, scope)
            .await?
            .unwrap_or_default();
        let discussion = self
            .viewport
            .first_text(screen, &self.locators.discussion, scope)
            .await?
            .unwrap_or_default();

        Ok(PartFields {
            options,
            answer,
            accuracy,
            key_point,
            discussion,
        })
    }
}

/// Tab 行的上下范围
fn tab_row(tabs: &[Element]) -> Option<Bounds> {
    let top = tabs.iter().map(|t| t.bounds.top).min()?;
    let bottom = tabs.iter().map(|t| t.bounds.bottom).max()?;
    let left = tabs.iter().map(|t| t.bounds.left).min()?;
    let right = tabs.iter().map(|t| t.bounds.right).max()?;
    Some(Bounds::new(left, top, right, bottom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{rid, single_page, toolbar, FakeScreen, FakeState, Node};

    fn extractor() -> QuestionExtractor {
        QuestionExtractor::new(&Config::default()).unwrap()
    }

    #[test]
    fn test_parse_answer() {
        let parser = FieldParser::new().unwrap();
        assert_eq!(parser.parse_answer("Answer: Correct answer AB"), "AB");
        assert_eq!(parser.parse_answer("Answer: See explanation"), "See explanation");
        assert_eq!(parser.parse_answer("答案：正确答案 C"), "C");
        assert_eq!(parser.parse_answer("  答案：参见解析  "), "参见解析");
    }

    #[test]
    fn test_parse_accuracy_keeps_first_match() {
        let parser = FieldParser::new().unwrap();
        assert_eq!(
            parser.parse_accuracy("correct-rate63.5%(you) correct-rate71.2%"),
            Some("63.5%".to_string())
        );
        assert_eq!(
            parser.parse_accuracy("正确率63.5%(我) 正确率71.2%"),
            Some("63.5%".to_string())
        );
        assert_eq!(parser.parse_accuracy("暂无统计"), None);
    }

    fn carousel_scene() -> FakeScreen {
        FakeScreen::new(1200, 2670, |_| {
            let mut nodes = vec![toolbar("内科学")];
            nodes.extend(single_page("prev", -1200, "第一章", "2/20", Some("答案：正确答案 B")));
            nodes.extend(single_page("cur", 0, "第一章", "3/20", Some("答案：正确答案 A")));
            nodes.extend(single_page("next", 1200, "第一章", "4/20", Some("答案：正确答案 C")));
            nodes
        })
    }

    #[tokio::test]
    async fn test_extract_single_reads_active_pane_only() {
        let screen = carousel_scene();
        let record = extractor().extract(&screen).await.unwrap();

        let QuestionRecord::Single(q) = record else {
            panic!("应为单题");
        };
        assert_eq!(q.course, "内科学");
        assert_eq!(q.no, "3/20");
        assert_eq!(q.unit.as_deref(), Some("第一章"));
        assert_eq!(q.mode.as_deref(), Some("A1型题"));
        assert_eq!(q.stem.as_deref(), Some("题干cur"));
        assert_eq!(q.options, vec!["A. 选项一", "B. 选项二", "C. 选项三"]);
        assert_eq!(q.answer.as_deref(), Some("A"));
        assert_eq!(q.accuracy, "63.5%");
        assert_eq!(q.key_point, "考点cur");
        assert_eq!(q.discussion, "解析cur");
    }

    #[tokio::test]
    async fn test_extract_is_deterministic() {
        let screen = carousel_scene();
        let extractor = extractor();

        let first = extractor.extract(&screen).await.unwrap();
        let second = extractor.extract(&screen).await.unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_read_position_missing_number_means_not_ready() {
        let screen = FakeScreen::new(1200, 2670, |_| {
            let mut nodes = vec![toolbar("内科学")];
            nodes.extend(
                single_page("cur", 0, "第一章", "3/20", None)
                    .into_iter()
                    .filter(|n| !n.id.ends_with("pagenumtv")),
            );
            nodes
        });
        assert_eq!(extractor().read_position(&screen).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_position_without_course_is_required_missing() {
        let screen = FakeScreen::new(1200, 2670, |_| single_page("cur", 0, "第一章", "3/20", None));
        let err = extractor().read_position(&screen).await.unwrap_err();
        assert!(crate::error::is_required_missing(&err));
    }

    /// 两问的病例题：Tab 点击切换，第二问的答案只有滚动过才挂载
    fn multi_part_nodes(state: &FakeState) -> Vec<Node> {
        let mut nodes = vec![
                toolbar("外科学"),
                Node::new("pane", rid("questiondetails_scrollview"), Bounds::new(0, 150, 1200, 2600)),
                Node::new("unit", rid("questiondetails_tv_title"), Bounds::new(20, 160, 900, 220)).text("第三章"),
                Node::new("numb", rid("pagenumtv"), Bounds::new(1000, 160, 1180, 220)).text("7 / 9"),
                Node::new("mode", rid("typeStr"), Bounds::new(20, 240, 300, 300)).text("A3型题"),
                Node::new("shared", rid("titletv"), Bounds::new(20, 320, 1180, 900)).text("男，45岁，腹痛3小时"),
                Node::new("tab1", rid("tv_column_name"), Bounds::new(20, 977, 300, 1107)).text("第1问"),
                Node::new("tab2", rid("tv_column_name"), Bounds::new(320, 977, 600, 1107)).text("第2问"),
            ];
            let (stem, answer) = if state.tab == 0 {
                ("最可能的诊断是", "答案：正确答案 B")
            } else {
                ("首选的检查是", "答案：正确答案 D")
            };
            nodes.push(Node::new("sub", rid("titletv"), Bounds::new(20, 1150, 1180, 1300)).text(stem));
            nodes.push(
                Node::new("opt", rid("QuestionOptions_item_tv_content"), Bounds::new(20, 1350, 1180, 1450))
                    .text(format!("A. {}选项", state.tab + 1)),
            );
            if state.tab == 0 || state.scroll > 0 {
                nodes.push(Node::new("ans", rid("questiondetails_tv_Answer"), Bounds::new(20, 1500, 1180, 1580)).text(answer));
            }
            nodes
    }

    fn multi_part_scene() -> FakeScreen {
        FakeScreen::new(1200, 2670, multi_part_nodes)
        .on_click(|state, node| {
            if node.handle == "tab2" {
                state.tab = 1;
                state.scroll = 0;
            }
            true
        })
        .on_swipe(|state, swipe| {
            if swipe[1] > swipe[3] {
                state.scroll += 1;
            }
        })
    }

    #[tokio::test]
    async fn test_extract_multi_part_switches_tabs_by_click() {
        let screen = multi_part_scene();
        let record = extractor().extract(&screen).await.unwrap();

        let QuestionRecord::MultiPart(q) = record else {
            panic!("应为多子题");
        };
        assert_eq!(q.no, "7/9");
        assert_eq!(q.shared_stem, "男，45岁，腹痛3小时");
        assert_eq!(q.parts.len(), 2);
        assert_eq!(q.parts[0].label, "第1问");
        assert_eq!(q.parts[0].stem, "最可能的诊断是");
        assert_eq!(q.parts[0].answer.as_deref(), Some("B"));
        assert_eq!(q.parts[1].label, "第2问");
        assert_eq!(q.parts[1].stem, "首选的检查是");
        assert_eq!(q.parts[1].options, vec!["A. 2选项"]);
        assert_eq!(q.parts[1].answer.as_deref(), Some("D"));

        let state = screen.state();
        assert_eq!(state.clicks, vec!["tab2"]);
        // 每一问各滚动一个来回，没有用到滑动切换
        assert_eq!(state.swipes.len(), 4);
    }

    #[tokio::test]
    async fn test_extract_multi_part_falls_back_to_swipe() {
        let screen = multi_part_scene()
            .on_click(|_, _| false)
            .on_swipe(|state, swipe| {
                if swipe == [1000, 2200, 200, 2200] {
                    state.tab = 1;
                } else if swipe[1] > swipe[3] {
                    state.scroll += 1;
                }
            });

        let record = extractor().extract(&screen).await.unwrap();
        let QuestionRecord::MultiPart(q) = record else {
            panic!("应为多子题");
        };
        assert_eq!(q.parts[1].stem, "首选的检查是");
        assert!(screen.state().swipes.contains(&[1000, 2200, 200, 2200]));
    }

    #[tokio::test]
    async fn test_extract_falls_back_to_single_when_tabs_vanish() {
        // 滚动一次后界面重建，Tab 行不见了
        let screen = FakeScreen::new(1200, 2670, |state| {
            let mut nodes = multi_part_nodes(state);
            if state.scroll > 0 {
                nodes.retain(|n| !n.handle.starts_with("tab"));
            }
            nodes
        })
        .on_swipe(|state, swipe| {
            if swipe[1] > swipe[3] {
                state.scroll += 1;
            }
        });

        let record = extractor().extract(&screen).await.unwrap();

        let QuestionRecord::Single(q) = record else {
            panic!("Tab 消失后应按单题提取");
        };
        assert_eq!(q.no, "7/9");
        assert_eq!(q.stem.as_deref(), Some("男，45岁，腹痛3小时"));
        assert_eq!(q.options, vec!["A. 1选项"]);
        assert_eq!(q.answer.as_deref(), Some("B"));
        assert!(screen.state().clicks.is_empty());
    }
}
