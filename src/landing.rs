//! 落地页交互状态的无头模型
//!
//! 对应页面脚本里的导航菜单、滚动效果、数字动画和联系表单，
//! 只保留状态变化，不涉及 DOM 和样式。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const ACTIVE_CLASS: &str = "active";
pub const SCROLLED_CLASS: &str = "scrolled";
pub const NAVBAR_SCROLL_THRESHOLD: f64 = 50.0;
pub const SCROLL_MILESTONES: [u8; 3] = [25, 50, 75];
pub const COUNTER_DURATION_MS: u64 = 2000;
pub const COUNTER_FRAME_MS: u64 = 16;
pub const ANCHOR_SCROLL_PADDING: f64 = 20.0;
pub const PARALLAX_SPEED: f64 = 0.5;
pub const THANK_YOU_MESSAGE: &str = "Thank you for your interest! We will contact you soon.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Tab { shift: bool },
    Other,
}

/// 键盘事件处理后焦点应移到哪里
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChange {
    /// 交给浏览器默认行为
    None,
    Hamburger,
    Item(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuClasses {
    pub menu: Vec<&'static str>,
    pub hamburger: Vec<&'static str>,
}

/// 移动端导航菜单
#[derive(Debug, Clone)]
pub struct NavMenu {
    open: bool,
    item_count: usize,
    focused: Option<usize>,
}

impl NavMenu {
    pub fn new(item_count: usize) -> Self {
        Self {
            open: false,
            item_count,
            focused: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    /// 点击汉堡按钮，菜单与按钮同时切换 active
    pub fn toggle(&mut self) {
        self.open = !self.open;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn link_clicked(&mut self) {
        self.close();
    }

    pub fn outside_click(&mut self, inside_menu_or_hamburger: bool) {
        if !inside_menu_or_hamburger {
            self.close();
        }
    }

    pub fn focus(&mut self, index: usize) {
        if index < self.item_count {
            self.focused = Some(index);
        }
    }

    /// 菜单打开时 Tab 在首尾之间循环，Escape 关闭并把焦点还给汉堡按钮
    pub fn key(&mut self, key: Key) -> FocusChange {
        if !self.open {
            return FocusChange::None;
        }
        match key {
            Key::Escape => {
                self.close();
                self.focused = None;
                FocusChange::Hamburger
            }
            Key::Tab { .. } if self.item_count == 0 => FocusChange::None,
            Key::Tab { shift: true } if self.focused == Some(0) => {
                let last = self.item_count - 1;
                self.focused = Some(last);
                FocusChange::Item(last)
            }
            Key::Tab { shift: false } if self.focused == Some(self.item_count - 1) => {
                self.focused = Some(0);
                FocusChange::Item(0)
            }
            _ => FocusChange::None,
        }
    }

    pub fn classes(&self) -> MenuClasses {
        let active = if self.open { vec![ACTIVE_CLASS] } else { Vec::new() };
        MenuClasses {
            menu: active.clone(),
            hamburger: active,
        }
    }
}

pub fn navbar_scrolled(scroll_y: f64) -> bool {
    scroll_y > NAVBAR_SCROLL_THRESHOLD
}

/// 锚点平滑滚动的目标位置，预留导航栏高度
pub fn anchor_scroll_target(target_top: f64, page_offset: f64, navbar_height: f64) -> f64 {
    target_top + page_offset - navbar_height - ANCHOR_SCROLL_PADDING
}

/// hero 区视差位移，超出 hero 高度后不再更新
pub fn parallax_offset(scrolled: f64, hero_height: f64) -> Option<f64> {
    (scrolled < hero_height).then_some(scrolled * PARALLAX_SPEED)
}

/// 滚动深度统计，每个里程碑只上报一次
#[derive(Debug, Clone, Default)]
pub struct ScrollDepthTracker {
    max_scroll: f64,
    fired: BTreeSet<u8>,
}

impl ScrollDepthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_scroll(&self) -> f64 {
        self.max_scroll
    }

    /// 返回本次新越过的里程碑
    pub fn observe(&mut self, scroll_y: f64, scroll_height: f64, viewport: f64) -> Vec<u8> {
        let scrollable = scroll_height - viewport;
        if scrollable <= 0.0 {
            return Vec::new();
        }
        let percent = scroll_y / scrollable * 100.0;
        if percent <= self.max_scroll {
            return Vec::new();
        }
        self.max_scroll = percent;

        let crossed: Vec<u8> = SCROLL_MILESTONES
            .iter()
            .copied()
            .filter(|m| self.max_scroll >= f64::from(*m) && !self.fired.contains(m))
            .collect();
        self.fired.extend(crossed.iter().copied());
        for m in &crossed {
            debug!(scroll_percentage = m, "scroll_depth");
        }
        crossed
    }
}

/// 数字动画：从 0 增长到目标值，结束后补上后缀
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCounter {
    pub target: u64,
    pub suffix: String,
}

impl StatCounter {
    /// 解析 "1,200+"、"98%" 这类文本，没有数字时返回 None
    pub fn parse(text: &str) -> Option<Self> {
        let digits: String = text.chars().filter(char::is_ascii_digit).collect();
        let target = digits.parse().ok()?;
        let mut suffix = String::new();
        if text.contains('+') {
            suffix.push('+');
        }
        if text.contains('%') {
            suffix.push('%');
        }
        Some(Self { target, suffix })
    }

    /// 每帧显示的数值，最后一帧等于目标值
    pub fn frames(&self) -> Vec<u64> {
        let steps = (COUNTER_DURATION_MS / COUNTER_FRAME_MS) as f64;
        let increment = self.target as f64 / steps;
        let mut frames = Vec::new();
        let mut current = 0.0;
        loop {
            current += increment;
            if current < self.target as f64 {
                frames.push(current.floor() as u64);
            } else {
                frames.push(self.target);
                break;
            }
        }
        frames
    }

    pub fn final_text(&self) -> String {
        format!("{}{}", group_thousands(self.target), self.suffix)
    }
}

/// 按 en-US 习惯加千位分隔符
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// 联系表单
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSubmission {
    #[serde(flatten)]
    pub form: ContactForm,
    pub submitted_at: DateTime<Utc>,
}

impl ContactForm {
    /// 提交后表单清空
    pub fn submit(&mut self) -> FormSubmission {
        let form = std::mem::take(self);
        info!(name = %form.name, email = %form.email, course = %form.course, "form submitted");
        FormSubmission {
            form,
            submitted_at: Utc::now(),
        }
    }
}
