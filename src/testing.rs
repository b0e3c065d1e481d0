//! 测试用的脚本化屏幕
//!
//! 场景由一个渲染闭包根据 `FakeState` 现算出来，点击/滑动/启动
//! 通过回调修改 `FakeState`，从而模拟轮播翻页、Tab 切换、列表滚动和 App 重启。
//! 空闲等待只累加计数，不真正休眠。

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::Result;

use crate::infrastructure::screen::{AppControl, Bounds, Element, Locator, Screen};
use crate::models::question::QuestionRecord;
use crate::services::record_writer::RecordSink;

pub(crate) const ID: &str = "com.yikaobang.yixue:id/";

/// 拼出完整资源 id
pub(crate) fn rid(name: &str) -> String {
    format!("{}{}", ID, name)
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub handle: String,
    pub id: String,
    pub text: Option<String>,
    pub bounds: Bounds,
    pub clickable: bool,
    pub parent: Option<String>,
}

impl Node {
    pub fn new(handle: impl Into<String>, id: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            handle: handle.into(),
            id: id.into(),
            text: None,
            bounds,
            clickable: false,
            parent: None,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn parent(mut self, handle: impl Into<String>) -> Self {
        self.parent = Some(handle.into());
        self
    }

    fn to_element(&self) -> Element {
        Element {
            handle: self.handle.clone(),
            id: self.id.clone(),
            bounds: self.bounds,
            text: self.text.clone(),
            clickable: self.clickable,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeState {
    pub page: usize,
    pub scroll: i32,
    pub tab: usize,
    pub flags: HashSet<String>,
    pub swipes: Vec<[i32; 4]>,
    pub clicks: Vec<String>,
    pub taps: Vec<(i32, i32)>,
    pub idle_ms: u64,
    pub launches: usize,
    pub settings_opened: usize,
}

impl FakeState {
    pub fn has(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn set(&mut self, flag: &str) {
        self.flags.insert(flag.to_string());
    }

    pub fn clear(&mut self, flag: &str) {
        self.flags.remove(flag);
    }
}

type RenderFn = Box<dyn Fn(&FakeState) -> Vec<Node> + Send + Sync>;
type ClickFn = Box<dyn Fn(&mut FakeState, &Node) -> bool + Send + Sync>;
type SwipeFn = Box<dyn Fn(&mut FakeState, [i32; 4]) + Send + Sync>;
type StateFn = Box<dyn Fn(&mut FakeState) + Send + Sync>;

pub(crate) struct FakeScreen {
    width: i32,
    height: i32,
    state: Mutex<FakeState>,
    render: RenderFn,
    on_click: ClickFn,
    on_swipe: SwipeFn,
    on_launch: StateFn,
    on_settings: StateFn,
}

impl FakeScreen {
    pub fn new(
        width: i32,
        height: i32,
        render: impl Fn(&FakeState) -> Vec<Node> + Send + Sync + 'static,
    ) -> Self {
        Self {
            width,
            height,
            state: Mutex::new(FakeState::default()),
            render: Box::new(render),
            on_click: Box::new(|_, _| true),
            on_swipe: Box::new(|_, _| {}),
            on_launch: Box::new(|_| {}),
            on_settings: Box::new(|_| {}),
        }
    }

    pub fn with_state(self, init: impl FnOnce(&mut FakeState)) -> Self {
        init(&mut *self.state.lock().unwrap());
        self
    }

    pub fn on_click(
        mut self,
        f: impl Fn(&mut FakeState, &Node) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.on_click = Box::new(f);
        self
    }

    pub fn on_swipe(mut self, f: impl Fn(&mut FakeState, [i32; 4]) + Send + Sync + 'static) -> Self {
        self.on_swipe = Box::new(f);
        self
    }

    pub fn on_launch(mut self, f: impl Fn(&mut FakeState) + Send + Sync + 'static) -> Self {
        self.on_launch = Box::new(f);
        self
    }

    pub fn on_settings(mut self, f: impl Fn(&mut FakeState) + Send + Sync + 'static) -> Self {
        self.on_settings = Box::new(f);
        self
    }

    pub fn state(&self) -> FakeState {
        self.state.lock().unwrap().clone()
    }
}

impl Screen for FakeScreen {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    async fn find(&self, locator: &Locator) -> Result<Vec<Element>> {
        let state = self.state.lock().unwrap();
        Ok((self.render)(&*state)
            .iter()
            .filter(|node| locator.matches(&node.id, node.text.as_deref()))
            .map(Node::to_element)
            .collect())
    }

    async fn click(&self, element: &Element) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let nodes = (self.render)(&*state);
        let Some(node) = nodes.iter().find(|n| n.handle == element.handle) else {
            return Ok(false);
        };
        state.clicks.push(node.handle.clone());
        Ok((self.on_click)(&mut *state, node))
    }

    async fn tap(&self, x: i32, y: i32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.taps.push((x, y));
        let nodes = (self.render)(&*state);
        // 由内向外：后渲染的节点视为在上层
        for node in nodes.iter().rev() {
            let b = node.bounds;
            if x >= b.left && x < b.right && y >= b.top && y < b.bottom {
                if (self.on_click)(&mut *state, node) {
                    break;
                }
            }
        }
        Ok(())
    }

    async fn parent(&self, element: &Element) -> Result<Option<Element>> {
        let state = self.state.lock().unwrap();
        let nodes = (self.render)(&*state);
        let parent_handle = nodes
            .iter()
            .find(|n| n.handle == element.handle)
            .and_then(|n| n.parent.clone());
        Ok(parent_handle.and_then(|handle| {
            nodes
                .iter()
                .find(|n| n.handle == handle)
                .map(Node::to_element)
        }))
    }

    async fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, _duration_ms: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.swipes.push([x1, y1, x2, y2]);
        (self.on_swipe)(&mut *state, [x1, y1, x2, y2]);
        Ok(())
    }

    async fn idle(&self, ms: u64) {
        self.state.lock().unwrap().idle_ms += ms;
    }
}

impl AppControl for FakeScreen {
    async fn launch(&self, _app_name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.launches += 1;
        (self.on_launch)(&mut *state);
        Ok(())
    }

    async fn open_settings(&self, _package: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.settings_opened += 1;
        (self.on_settings)(&mut *state);
        Ok(())
    }
}

/// 水平向左的翻页手势
pub(crate) fn is_advance(swipe: [i32; 4]) -> bool {
    swipe[0] - swipe[2] > 300 && (swipe[1] - swipe[3]).abs() < 100
}

/// 顶栏课程名
pub(crate) fn toolbar(course: &str) -> Node {
    Node::new("toolbar", rid("include_title_center"), Bounds::new(300, 40, 900, 120)).text(course)
}

/// 单题详情页的一屏内容，`x` 为该页在轮播中的水平偏移
pub(crate) fn single_page(
    tag: &str,
    x: i32,
    unit: &str,
    number: &str,
    answer: Option<&str>,
) -> Vec<Node> {
    let h = |name: &str| format!("{}-{}", tag, name);
    let mut nodes = vec![
        Node::new(h("pane"), rid("questiondetails_scrollview"), Bounds::new(x, 150, x + 1200, 2600)),
        Node::new(h("unit"), rid("questiondetails_tv_title"), Bounds::new(x + 20, 160, x + 900, 220)).text(unit),
        Node::new(h("numb"), rid("pagenumtv"), Bounds::new(x + 1000, 160, x + 1180, 220)).text(format!(" {} ", number)),
        Node::new(h("mode"), rid("typeStr"), Bounds::new(x + 20, 240, x + 300, 300)).text("A1型题"),
        Node::new(h("stem"), rid("titletv"), Bounds::new(x + 20, 320, x + 1180, 600)).text(format!("题干{}", tag)),
        // 选项故意乱序，由提取器按纵向中心排序
        Node::new(h("opt-c"), rid("QuestionOptions_item_tv_content"), Bounds::new(x + 20, 910, x + 1180, 1010)).text("C. 选项三"),
        Node::new(h("opt-a"), rid("QuestionOptions_item_tv_content"), Bounds::new(x + 20, 650, x + 1180, 750)).text("A. 选项一"),
        Node::new(h("opt-b"), rid("QuestionOptions_item_tv_content"), Bounds::new(x + 20, 780, x + 1180, 880)).text("B. 选项二"),
        Node::new(h("stat"), rid("questiondetails_tv_statistics"), Bounds::new(x + 20, 1200, x + 1180, 1260)).text("正确率63.5%(我) 正确率71.2%"),
        Node::new(h("point"), rid("questiondetails_tv_content_ques1"), Bounds::new(x + 20, 1300, x + 1180, 1500)).text(format!("考点{}", tag)),
        Node::new(h("discuss"), rid("questiondetails_tv_contents"), Bounds::new(x + 20, 1550, x + 1180, 2000)).text(format!("解析{}", tag)),
    ];
    if let Some(answer) = answer {
        nodes.push(
            Node::new(h("answer"), rid("questiondetails_tv_Answer"), Bounds::new(x + 20, 1100, x + 1180, 1180))
                .text(answer),
        );
    }
    nodes
}

/// 内存中的记录接收端
#[derive(Default)]
pub(crate) struct MemorySink {
    pub records: Mutex<Vec<QuestionRecord>>,
}

impl MemorySink {
    pub fn records(&self) -> Vec<QuestionRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordSink for MemorySink {
    async fn persist(&self, record: &QuestionRecord) -> Result<String> {
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(format!("memory/{}", records.len()))
    }
}
