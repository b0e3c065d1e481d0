//! 爬取流程 - 流程层
//!
//! 核心职责：把分类、定位、提取、校验、保存、重置组合成一个状态机
//!
//! 状态迁移：
//! 1. Bootstrapping → AtListGrid | AtDetail | AtTransition
//! 2. AtListGrid → AtDetail（选背题模式，点第 1 题）
//! 3. AtDetail → AtDetail（提取 → 校验 → 保存 → 翻页）
//! 4. AtDetail → AtTransition → AtDetail（跳转下一章）
//! 5. AtDetail → Stalled → AtDetail | Finished
//! 6. * → Resetting → Bootstrapping

use std::fmt::Display;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{is_required_missing, is_transient_ui, is_unrecoverable, CrawlError};
use crate::infrastructure::screen::{AppControl, Locator, Screen};
use crate::infrastructure::wait::{wait_until, Condition};
use crate::models::position::PagePosition;
use crate::models::question::QuestionRecord;
use crate::services::overlay::OverlayService;
use crate::services::page_classifier::{PageClassifier, PageKind};
use crate::services::position_locator::PositionLocator;
use crate::services::question_extractor::QuestionExtractor;
use crate::services::record_writer::RecordSink;
use crate::services::recovery::RecoveryController;
use crate::services::skip_writer::SkipWriter;
use crate::services::validator;
use crate::services::viewport::Scope;
use crate::utils::logging::log_round;
use crate::utils::truncate_text;
use crate::workflow::crawl_ctx::CrawlState;

/// 筛选面板展开时向上滚动的次数上限
const MAX_FILTER_SCROLLS: usize = 50;

/// 结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// 强制翻页后位置仍不变，也没有下一章
    EndOfContent,
    /// 周期性返回列表页后没能回到原题号
    CheckpointResumeFailed,
    IterationLimit,
}

impl Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            FinishReason::EndOfContent => "已到达末尾",
            FinishReason::CheckpointResumeFailed => "周期性返回后恢复失败",
            FinishReason::IterationLimit => "达到轮数上限",
        };
        write!(f, "{}", text)
    }
}

/// 导航状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Bootstrapping,
    AtDetail,
    AtListGrid,
    AtTransition,
    Stalled,
    Resetting,
    Finished(FinishReason),
}

/// 一次爬取的结果汇总
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub finish: FinishReason,
    pub saved: usize,
    pub skipped: usize,
    pub resets: usize,
    pub rounds: usize,
}

/// 爬取流程
///
/// - 持有各项业务能力，不持有屏幕
/// - 只有这里会修改 `CrawlState`
pub struct CrawlFlow<'a, K: RecordSink> {
    config: Config,
    classifier: PageClassifier,
    overlay: OverlayService,
    extractor: QuestionExtractor,
    locator: PositionLocator,
    recovery: RecoveryController,
    sink: &'a K,
    skip_writer: Option<SkipWriter>,
}

impl<'a, K: RecordSink> CrawlFlow<'a, K> {
    pub fn new(config: &Config, sink: &'a K) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            classifier: PageClassifier::new(&config.selectors),
            overlay: OverlayService::new(&config.selectors, config.timings.overlay_idle_ms),
            extractor: QuestionExtractor::new(config)?,
            locator: PositionLocator::new(config),
            recovery: RecoveryController::new(config),
            sink,
            skip_writer: None,
        })
    }

    pub fn with_skip_writer(mut self, writer: SkipWriter) -> Self {
        self.skip_writer = Some(writer);
        self
    }

    fn id(&self, id: &str) -> Locator {
        Locator::id(id)
    }

    /// 启动 App 并关闭开屏弹层；有上次保存的位置时先导航过去
    pub async fn startup<S: Screen + AppControl>(&self, screen: &S, state: &CrawlState) -> Result<()> {
        info!("启动: {}", self.config.app_name);
        screen.launch(&self.config.app_name).await?;
        screen.idle(self.config.timings.startup_idle_ms).await;
        self.overlay.dismiss(screen).await?;
        screen.idle(self.config.timings.action_idle_ms).await;
        // 开屏广告后可能还跟着更新提示、活动弹窗
        let closed = self.overlay.dismiss_all(screen, 3).await?;
        debug!("启动时关闭弹层 {} 个", closed);

        if let Some(saved) = &state.last_record {
            info!("从上次保存的记录恢复: {}", saved.reference);
            self.recovery.renavigate(screen, &saved.position).await;
        }
        Ok(())
    }

    /// 运行状态机直到结束
    ///
    /// 只有无法恢复的错误会返回 `Err`，已保存的记录不受影响。
    pub async fn run<S: Screen + AppControl>(
        &self,
        screen: &S,
        state: &mut CrawlState,
    ) -> Result<CrawlSummary> {
        let mut nav = NavState::Bootstrapping;
        let mut rounds = 0;

        let finish = loop {
            if let NavState::Finished(reason) = nav {
                break reason;
            }
            if rounds >= self.config.max_iterations {
                warn!("达到轮数上限 {}", self.config.max_iterations);
                break FinishReason::IterationLimit;
            }
            rounds += 1;

            if let Err(e) = self.refresh_chapter(screen, state).await {
                debug!("读取章节失败: {:#}", e);
            }
            log_round(rounds, &state.current_chapter, state.saved_count);
            debug!("状态: {:?} {}", nav, state);

            nav = match self.step(screen, state, nav).await {
                Ok(next) => next,
                Err(e) => self.on_error(e, state)?,
            };
        };

        info!("\n========== 爬取结束: {} ==========", finish);
        Ok(CrawlSummary {
            finish,
            saved: state.saved_count,
            skipped: state.skipped_count,
            resets: state.resets,
            rounds,
        })
    }

    async fn step<S: Screen + AppControl>(
        &self,
        screen: &S,
        state: &mut CrawlState,
        nav: NavState,
    ) -> Result<NavState> {
        match nav {
            NavState::Bootstrapping => self.bootstrap(screen, state).await,
            NavState::AtDetail => self.at_detail(screen, state).await,
            NavState::AtListGrid => self.at_list_grid(screen, state).await,
            NavState::AtTransition => self.at_transition(screen, state).await,
            NavState::Stalled => self.stalled(screen, state).await,
            NavState::Resetting => self.resetting(screen, state).await,
            NavState::Finished(reason) => Ok(NavState::Finished(reason)),
        }
    }

    /// 错误分类处理：致命的直接返回，必需元素缺失直接重置，导航偏移重新分类，其余计入失败
    fn on_error(&self, e: anyhow::Error, state: &mut CrawlState) -> Result<NavState> {
        if is_unrecoverable(&e) {
            return Err(e);
        }
        if is_required_missing(&e) {
            state.failure_count += 1;
            warn!("必需元素缺失: {:#}，重置", e);
            return Ok(NavState::Resetting);
        }
        if let Some(CrawlError::NavigationDrift(reason)) = e.downcast_ref::<CrawlError>() {
            warn!("导航偏移: {}，重新判断页面", reason);
            return Ok(NavState::Bootstrapping);
        }

        state.failure_count += 1;
        let kind = if is_transient_ui(&e) { "界面未就绪" } else { "本轮失败" };
        warn!(
            "{}: {:#} (连续失败 {}/{})",
            kind, e, state.failure_count, self.config.max_failures
        );
        Ok(self.escalate_if_needed(state, NavState::Bootstrapping))
    }

    fn escalate_if_needed(&self, state: &CrawlState, otherwise: NavState) -> NavState {
        if state.failure_count >= self.config.max_failures {
            NavState::Resetting
        } else {
            otherwise
        }
    }

    /// 关闭后仍是弹层：关不掉的弹层计入失败，达到上限时重置
    async fn persistent_overlay<S: Screen>(
        &self,
        screen: &S,
        state: &mut CrawlState,
        otherwise: NavState,
    ) -> Result<NavState> {
        let closed = self.overlay.dismiss(screen).await?;
        state.failure_count += 1;
        warn!(
            "弹层仍未关闭{} (连续失败 {}/{})",
            if closed { "" } else { "，没有可点的关闭按钮" },
            state.failure_count,
            self.config.max_failures
        );
        Ok(self.escalate_if_needed(state, otherwise))
    }

    async fn bootstrap<S: Screen>(&self, screen: &S, state: &mut CrawlState) -> Result<NavState> {
        self.overlay.dismiss(screen).await?;

        let kind = self.classifier.classify(screen).await?;
        info!("当前页面: {}", kind);
        match kind {
            PageKind::ListGrid | PageKind::ModeSelect => Ok(NavState::AtListGrid),
            PageKind::ChapterTransition => Ok(NavState::AtTransition),
            PageKind::Detail => Ok(NavState::AtDetail),
            PageKind::Overlay => {
                self.persistent_overlay(screen, state, NavState::Bootstrapping)
                    .await
            }
            PageKind::Unknown => {
                if self
                    .extractor
                    .wait_for_page(screen, self.config.timings.page_wait_ms)
                    .await?
                {
                    Ok(NavState::AtDetail)
                } else {
                    Err(CrawlError::transient("详情页题干").into())
                }
            }
        }
    }

    async fn at_detail<S: Screen>(&self, screen: &S, state: &mut CrawlState) -> Result<NavState> {
        self.overlay.dismiss(screen).await?;

        match self.classifier.classify(screen).await? {
            PageKind::ChapterTransition => return Ok(NavState::AtTransition),
            PageKind::ListGrid | PageKind::ModeSelect => {
                info!("检测到题目列表页，尝试进入");
                return Ok(NavState::AtListGrid);
            }
            PageKind::Overlay => {
                return self
                    .persistent_overlay(screen, state, NavState::AtDetail)
                    .await;
            }
            PageKind::Detail | PageKind::Unknown => {}
        }

        let Some(position) = self.wait_position(screen, self.config.timings.page_wait_ms).await? else {
            return self.page_not_ready(screen, state).await;
        };

        if state.observe_unit(&position) {
            info!("★ 章节切换: → {}", position.unit_or_empty());
        }

        if state.is_repeat(&position) {
            state.stall_count += 1;
            info!(
                "题号未变({}) 卡住: {}",
                position.question_number, state.stall_count
            );
            if state.stall_count >= self.config.stall_threshold {
                return Ok(NavState::Stalled);
            }
            self.advance(screen).await?;
            return Ok(NavState::AtDetail);
        }
        state.stall_count = 0;

        match self.extract_with_retry(screen, &position).await {
            Ok(record) => {
                let reference = self.sink.persist(&record).await?;
                info!(
                    "  [{}{}] {}",
                    record.mode().unwrap_or("?"),
                    if record.is_multi_part() { " 多子题" } else { "" },
                    truncate_text(record.stem_preview(), 30)
                );
                debug!("已保存到 {}", reference);
                if position.numerator().is_some() && position.numerator() == position.total() {
                    info!("  已到本单元最后一题 {}", position.question_number);
                }
                state.note_saved(position, reference);

                let interval = self.config.checkpoint_interval;
                if interval > 0 && state.saved_count % interval == 0 {
                    if !self.checkpoint(screen, state).await? {
                        warn!("周期性返回失败，结束爬取");
                        return Ok(NavState::Finished(FinishReason::CheckpointResumeFailed));
                    }
                }
            }
            Err(e) => {
                let missing = match e.downcast_ref::<CrawlError>() {
                    Some(CrawlError::IncompleteRecord { missing, .. }) => missing.clone(),
                    _ => return Err(e),
                };
                warn!("  ✗ 重试仍不完整，跳过 {}", position);
                for field in &missing {
                    warn!("    缺失: {}", field);
                }
                if let Some(writer) = &self.skip_writer {
                    if let Err(write_err) = writer.write(&position, &missing).await {
                        warn!("写入跳过记录失败: {:#}", write_err);
                    }
                }

                state.note_skipped(position);
                warn!("连续失败: {}/{}", state.failure_count, self.config.max_failures);
                if state.failure_count >= self.config.max_failures {
                    return Ok(NavState::Resetting);
                }
            }
        }

        self.advance(screen).await?;
        Ok(NavState::AtDetail)
    }

    /// 等待页面就绪并读取位置
    async fn wait_position<S: Screen>(&self, screen: &S, timeout_ms: u64) -> Result<Option<PagePosition>> {
        if !self.extractor.wait_for_page(screen, timeout_ms).await? {
            return Ok(None);
        }
        self.extractor.read_position(screen).await
    }

    async fn page_not_ready<S: Screen>(&self, screen: &S, state: &mut CrawlState) -> Result<NavState> {
        warn!("页面未加载");
        self.overlay.dismiss(screen).await?;

        if self.classifier.classify(screen).await? == PageKind::ChapterTransition {
            return Ok(NavState::AtTransition);
        }
        if self
            .extractor
            .wait_for_page(screen, self.config.timings.page_retry_wait_ms)
            .await?
        {
            return Ok(NavState::AtDetail);
        }

        state.failure_count += 1;
        warn!("连续失败: {}/{}", state.failure_count, self.config.max_failures);
        if state.failure_count >= self.config.max_failures {
            return Ok(NavState::Resetting);
        }
        self.advance(screen).await?;
        Ok(NavState::AtDetail)
    }

    /// 提取并校验，不完整时等待后重试一次
    ///
    /// 重试后仍不完整返回 `CrawlError::IncompleteRecord`
    async fn extract_with_retry<S: Screen>(
        &self,
        screen: &S,
        position: &PagePosition,
    ) -> Result<QuestionRecord> {
        let mut missing = Vec::new();

        for attempt in 1..=2 {
            match self.extractor.extract(screen).await {
                Ok(record) => {
                    missing = validator::missing_fields(&record);
                    if missing.is_empty() {
                        return Ok(record);
                    }
                    warn!("  ✗ 数据不完整 (第 {} 次): {:?}", attempt, missing);
                }
                Err(e) if is_unrecoverable(&e) || is_required_missing(&e) => return Err(e),
                Err(e) => {
                    warn!("  拉取异常 (第 {} 次): {:#}", attempt, e);
                    missing = vec![format!("拉取异常: {}", e)];
                }
            }
            if attempt == 1 {
                screen.idle(self.config.timings.retry_delay_ms).await;
            }
        }

        Err(CrawlError::IncompleteRecord {
            position: position.question_number.clone(),
            missing,
        }
        .into())
    }

    async fn advance<S: Screen>(&self, screen: &S) -> Result<()> {
        self.config.gestures.advance.perform(screen).await?;
        screen.idle(self.config.timings.advance_settle_ms).await;
        Ok(())
    }

    /// 强制翻页后再看一次：仍是同一题且没有下一章则结束
    async fn stalled<S: Screen>(&self, screen: &S, state: &mut CrawlState) -> Result<NavState> {
        info!("连续 {} 次题号未变，强制翻页确认", state.stall_count);
        self.config.gestures.force_advance.perform(screen).await?;
        screen.idle(self.config.timings.scroll_settle_ms).await;

        match self.classifier.classify(screen).await? {
            PageKind::ChapterTransition => {
                state.stall_count = 0;
                return Ok(NavState::AtTransition);
            }
            PageKind::ListGrid | PageKind::ModeSelect => {
                state.stall_count = 0;
                return Ok(NavState::AtListGrid);
            }
            _ => {}
        }

        let current = self
            .wait_position(screen, self.config.timings.page_retry_wait_ms)
            .await?;
        if current.is_some() && current == state.last_position {
            info!("确认到达末尾");
            return Ok(NavState::Finished(FinishReason::EndOfContent));
        }

        state.stall_count = 0;
        Ok(NavState::AtDetail)
    }

    async fn at_list_grid<S: Screen>(&self, screen: &S, state: &mut CrawlState) -> Result<NavState> {
        info!("★ 检测到题目列表页 ★");
        if self.enter_from_list(screen, state).await? {
            Ok(NavState::AtDetail)
        } else {
            warn!("进入失败，重置");
            Ok(NavState::Resetting)
        }
    }

    async fn at_transition<S: Screen>(&self, screen: &S, state: &mut CrawlState) -> Result<NavState> {
        let timings = &self.config.timings;
        let selectors = &self.config.selectors;

        self.refresh_chapter(screen, state).await?;
        let Some(next) = screen.find(&self.id(&selectors.next_chapter)).await?.into_iter().next()
        else {
            return Err(CrawlError::NavigationDrift("章节切换标记消失".to_string()).into());
        };

        info!("★ 当前章节结束: {}，跳转下一章 ★", state.current_chapter);
        screen.click(&next).await?;
        screen.idle(timings.action_idle_ms).await;

        let popup = self.id(&selectors.popup);
        if !wait_until(screen, Condition::Absent(&popup), timings.popup_wait_ms, timings.poll_ms).await? {
            warn!("  等待超时，弹窗仍然存在");
        }

        let loading = self.id(&selectors.loading_marker);
        if screen.exists(&loading).await? {
            // 新章节加载完会自动回到顶部，标记随之消失
            wait_until(screen, Condition::Absent(&loading), timings.list_wait_ms, timings.poll_ms).await?;
        } else {
            info!("  加载标记不存在，等待新章节题目加载...");
            screen.idle(timings.transition_idle_ms).await;
        }

        if self.enter_from_list(screen, state).await? {
            Ok(NavState::AtDetail)
        } else {
            warn!("进入新章节失败，重置");
            Ok(NavState::Resetting)
        }
    }

    /// 从列表页进入：收起筛选面板 → 选全部和背题模式 → 点第 1 题
    async fn enter_from_list<S: Screen>(&self, screen: &S, state: &mut CrawlState) -> Result<bool> {
        let timings = &self.config.timings;
        let selectors = &self.config.selectors;

        let loading = self.id(&selectors.loading_marker);
        let mut scrolls = 0;
        while scrolls < MAX_FILTER_SCROLLS && screen.exists(&loading).await? {
            debug!("  等待加载标记消失... ({}/{})", scrolls + 1, MAX_FILTER_SCROLLS);
            self.config.gestures.list_scroll_up.perform(screen).await?;
            screen.idle(timings.action_idle_ms).await;
            scrolls += 1;
        }

        let label = self.id(&selectors.filter_label);
        for wanted in [&selectors.filter_all_text, &selectors.filter_recite_text] {
            let labels = screen.find(&label).await?;
            if let Some(element) = labels.iter().find(|l| l.text() == Some(wanted.as_str())) {
                info!("  点击{}", wanted);
                screen.click(element).await?;
                screen.idle(timings.action_idle_ms).await;
            }
        }

        if !wait_until(
            screen,
            Condition::Present(self.locator.list_item()),
            timings.list_wait_ms,
            timings.poll_ms,
        )
        .await?
        {
            warn!("  题目列表未加载");
            return Ok(false);
        }

        if !self.locator.locate(screen, 1).await? {
            warn!("  未找到有效的题号 1");
            return Ok(false);
        }

        state.clear_position();
        self.refresh_chapter(screen, state).await?;
        info!("★ 已进入新章节: {} ★", state.current_chapter);
        Ok(true)
    }

    /// 周期性返回列表页释放内存，再回到上次的题号
    async fn checkpoint<S: Screen>(&self, screen: &S, state: &CrawlState) -> Result<bool> {
        let timings = &self.config.timings;
        info!("========== 执行周期性返回 ==========");
        info!("当前已保存: {} 题", state.saved_count);

        let back = self.id(&self.config.selectors.back_button);
        if !wait_until(screen, Condition::Present(&back), timings.page_retry_wait_ms, timings.poll_ms).await? {
            warn!("  未找到返回按钮");
            return Ok(false);
        }
        if let Some(button) = screen.find(&back).await?.into_iter().next() {
            info!("  点击返回按钮");
            screen.click(&button).await?;
            screen.idle(timings.action_idle_ms).await;
        }

        if !wait_until(
            screen,
            Condition::Present(self.locator.list_item()),
            timings.list_wait_ms,
            timings.poll_ms,
        )
        .await?
        {
            warn!("  未能返回题目列表页");
            return Ok(false);
        }

        info!("  等待 {} 秒释放内存...", timings.checkpoint_idle_ms / 1000);
        screen.idle(timings.checkpoint_idle_ms).await;
        self.overlay.dismiss(screen).await?;

        let Some(target) = state.last_position.as_ref().and_then(|p| p.numerator()) else {
            warn!("  没有记录上次题号，无法恢复");
            return Ok(false);
        };
        info!("  恢复到题号: {}", target);
        self.locator.locate(screen, target).await
    }

    async fn resetting<S: Screen + AppControl>(
        &self,
        screen: &S,
        state: &mut CrawlState,
    ) -> Result<NavState> {
        state.resets += 1;
        state.consecutive_resets += 1;
        if state.consecutive_resets > self.config.max_consecutive_resets {
            return Err(CrawlError::unrecoverable(format!(
                "连续重置 {} 次仍未保存新题目",
                state.consecutive_resets - 1
            ))
            .into());
        }

        let target = state.resume_target().cloned();
        self.recovery.reset(screen, target.as_ref()).await?;
        state.after_reset();
        Ok(NavState::Bootstrapping)
    }

    /// 更新当前章节：优先标题栏，没有就用单元名
    async fn refresh_chapter<S: Screen>(&self, screen: &S, state: &mut CrawlState) -> Result<()> {
        let selectors = &self.config.selectors;
        let title = screen
            .find(&self.id(&selectors.chapter_title))
            .await?
            .iter()
            .find_map(|e| e.non_empty_text().map(str::to_string));

        let chapter = match title {
            Some(title) => Some(title),
            None => {
                self.extractor
                    .viewport()
                    .first_text(screen, &self.id(&selectors.unit_title), Scope::Global)
                    .await?
            }
        };
        if let Some(chapter) = chapter {
            if chapter != state.current_chapter {
                debug!("章节: {}", truncate_text(&chapter, 30));
            }
            state.current_chapter = chapter;
        }
        Ok(())
    }
}
