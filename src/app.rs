use iced::widget::button as button_widget;
use iced::widget::canvas::{Canvas, Frame, Geometry, Path, Program, Stroke, Text};
use iced::widget::container as container_widget;
use iced::widget::{button, checkbox, column, container, pick_list, row, scrollable, slider, text, Column, Row};
use iced::theme;
use iced::time::Instant;
use iced::{Alignment, Background, Color, Command, Element, Length, Renderer, Theme};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::rc::Rc;
use std::time::Duration;
use tracing::{info, warn};

use pulse_fm_chain::chain::tabs_for;
use pulse_fm_chain::config::EngineConfig;
use pulse_fm_chain::mixer::{MIC, PROGRAM};
use pulse_fm_chain::module::ProcessingModule;
use pulse_fm_chain::param::{ParamDomain, ParamSpec};
use pulse_fm_chain::preset::PresetLibrary;
use pulse_fm_chain::registry::pty_label;
use pulse_fm_chain::render::{DisplayList, DrawCommand, Rgba, SurfaceSize};
use pulse_fm_chain::scheduler::{DrawSurface, VisualizationSurface};
use pulse_fm_chain::{ChainId, Engine, EngineCommand, FrameOutcome, ModuleId, ParamValue, VisualizationTab};

const SCOPE_HEIGHT: f32 = 320.0;
const GRADIENT_SLICES: usize = 64;

fn color_bg() -> Color {
    Color::from_rgb8(10, 12, 16)
}

fn color_surface() -> Color {
    Color::from_rgb8(20, 26, 34)
}

fn color_surface_alt() -> Color {
    Color::from_rgb8(26, 34, 44)
}

fn color_border() -> Color {
    Color::from_rgb8(40, 52, 66)
}

fn color_text() -> Color {
    Color::from_rgb8(236, 242, 248)
}

fn color_muted() -> Color {
    Color::from_rgb8(150, 168, 186)
}

fn color_accent() -> Color {
    Color::from_rgb8(34, 211, 238)
}

fn color_accent_warm() -> Color {
    Color::from_rgb8(249, 115, 22)
}

fn color_live() -> Color {
    Color::from_rgb8(16, 185, 129)
}

fn color_danger() -> Color {
    Color::from_rgb8(239, 68, 68)
}

fn to_color(c: Rgba) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, c.a as f32 / 255.0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetItem {
    id: String,
    name: String,
}

impl std::fmt::Display for PresetItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Tick(Instant),
    ChainSelected(ChainId),
    TabSelected(ChainId, VisualizationTab),
    ChainToggled(ChainId, bool),
    ModuleToggled(ChainId, ModuleId, bool),
    NumberChanged(ChainId, ModuleId, String, f32),
    ChoiceChanged(ChainId, ModuleId, String, String),
    ToggleChanged(ChainId, ModuleId, String, bool),
    PresetSelected(PresetItem),
    ApplyPreset,
    BrowsePresets,
    PresetFilePicked(Option<String>),
    PlayToggled,
    AutoBalanceChanged(bool),
    MicLevelChanged(f32),
    ProgramFaderChanged(f32),
    ResetChain(ChainId),
}

/// Host side of a registered surface: the scheduler presents into it and
/// the canvas paints whatever was presented last.
#[derive(Debug, Clone)]
struct FrameBuffer(Rc<RefCell<Painted>>);

#[derive(Debug)]
struct Painted {
    size: SurfaceSize,
    list: DisplayList,
    /// Canvas bounds seen at the last draw, in logical pixels.
    canvas: Option<(f32, f32)>,
}

impl FrameBuffer {
    fn new() -> Self {
        FrameBuffer(Rc::new(RefCell::new(Painted {
            size: SurfaceSize::new(0.0, 0.0),
            list: Vec::new(),
            canvas: None,
        })))
    }

    fn canvas_size(&self) -> Option<(f32, f32)> {
        self.0.borrow().canvas
    }
}

fn needs_resize(surface: &VisualizationSurface, width: f32, height: f32, scale: f32) -> bool {
    let logical = surface.logical_size();
    (logical.width - width).abs() > 0.5
        || (logical.height - height).abs() > 0.5
        || (surface.scale() - scale).abs() > f32::EPSILON
}

impl DrawSurface for FrameBuffer {
    fn is_alive(&self) -> bool {
        true
    }

    fn provision(&mut self, width_px: u32, height_px: u32) {
        self.0.borrow_mut().size = SurfaceSize::new(width_px as f32, height_px as f32);
    }

    fn present(&mut self, size: SurfaceSize, list: &DisplayList) {
        let mut painted = self.0.borrow_mut();
        painted.size = size;
        painted.list = list.clone();
    }
}

fn surface_id(chain: ChainId, tab: VisualizationTab) -> String {
    format!("{}:{}", chain.as_str(), tab.renderer())
}

pub struct App {
    engine: Engine,
    chain_selected: ChainId,
    buffers: BTreeMap<String, FrameBuffer>,
    preset_selected: Option<PresetItem>,
    frame_interval: Duration,
    scale: f32,
    last_tick: Option<Instant>,
    status: String,
}

impl App {
    fn register_surfaces(&mut self, chain: ChainId) {
        for tab in tabs_for(chain) {
            let id = surface_id(chain, *tab);
            let buffer = self.buffers.entry(id.clone()).or_insert_with(FrameBuffer::new).clone();
            if let Err(e) = self.engine.register_surface(
                id,
                chain,
                tab.renderer(),
                Box::new(buffer),
                640.0,
                SCOPE_HEIGHT,
                self.scale,
            ) {
                warn!("{}", e);
            }
        }
    }

    /// Re-provisions every surface whose canvas was laid out at a new size
    /// since the last frame.
    fn sync_surfaces(&mut self) {
        for (id, buffer) in &self.buffers {
            let Some((width, height)) = buffer.canvas_size() else {
                continue;
            };
            let stale = self
                .engine
                .scheduler()
                .surface(id)
                .is_some_and(|s| needs_resize(s, width, height, self.scale));
            if stale {
                if let Err(e) = self.engine.resize_surface(id, width, height, self.scale) {
                    warn!("{}", e);
                }
            }
        }
    }

    fn preset_items(&self) -> Vec<PresetItem> {
        self.engine
            .presets()
            .for_chain(self.chain_selected)
            .map(|p| PresetItem {
                id: p.id.clone(),
                name: p.name.clone(),
            })
            .collect()
    }

    fn run(&mut self, command: EngineCommand) {
        match self.engine.dispatch(command) {
            Ok(_) => {}
            Err(e) => self.status = e.to_string(),
        }
    }
}

impl iced::Application for App {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = EngineConfig;

    fn new(config: EngineConfig) -> (Self, Command<Self::Message>) {
        let mut app = App {
            engine: Engine::new(&config),
            chain_selected: ChainId::Broadcast,
            buffers: BTreeMap::new(),
            preset_selected: None,
            frame_interval: Duration::from_millis(config.frame_interval_ms.max(1)),
            scale: config.surface_scale(),
            last_tick: None,
            status: "Ready".to_string(),
        };
        for chain in ChainId::ALL {
            app.register_surfaces(chain);
        }
        app.engine.start();
        (app, Command::none())
    }

    fn title(&self) -> String {
        "Pulse FM Processing Chain".to_string()
    }

    fn scale_factor(&self) -> f64 {
        self.scale as f64
    }

    fn subscription(&self) -> iced::Subscription<Self::Message> {
        iced::time::every(self.frame_interval).map(Message::Tick)
    }

    fn update(&mut self, message: Self::Message) -> Command<Self::Message> {
        match message {
            Message::Tick(now) => {
                let dt = self
                    .last_tick
                    .map(|t| now.duration_since(t).as_secs_f32())
                    .unwrap_or(self.frame_interval.as_secs_f32());
                self.last_tick = Some(now);
                self.sync_surfaces();
                if matches!(self.engine.frame(dt), FrameOutcome::Stopped) {
                    self.status = "Renderer stopped".to_string();
                }
                Command::none()
            }
            Message::ChainSelected(chain) => {
                self.chain_selected = chain;
                self.preset_selected = None;
                Command::none()
            }
            Message::TabSelected(chain, tab) => {
                self.run(EngineCommand::SetActiveTab { chain, tab });
                Command::none()
            }
            Message::ChainToggled(chain, enabled) => {
                self.run(EngineCommand::SetChainEnabled { chain, enabled });
                Command::none()
            }
            Message::ModuleToggled(chain, module, enabled) => {
                self.run(EngineCommand::SetModuleEnabled { chain, module, enabled });
                Command::none()
            }
            Message::NumberChanged(chain, module, param, v) => {
                self.run(EngineCommand::SetParameter {
                    chain,
                    module,
                    param,
                    value: ParamValue::Number(v),
                });
                Command::none()
            }
            Message::ChoiceChanged(chain, module, param, v) => {
                self.run(EngineCommand::SetParameter {
                    chain,
                    module,
                    param,
                    value: ParamValue::Choice(v),
                });
                Command::none()
            }
            Message::ToggleChanged(chain, module, param, v) => {
                self.run(EngineCommand::SetParameter {
                    chain,
                    module,
                    param,
                    value: ParamValue::Toggle(v),
                });
                Command::none()
            }
            Message::PresetSelected(item) => {
                self.preset_selected = Some(item);
                Command::none()
            }
            Message::ApplyPreset => {
                if let Some(item) = self.preset_selected.clone() {
                    match self.engine.apply_preset(self.chain_selected, &item.id) {
                        Ok(touched) => {
                            self.status = format!("{} applied to {} modules", item.name, touched.len());
                        }
                        Err(e) => self.status = e.to_string(),
                    }
                }
                Command::none()
            }
            Message::BrowsePresets => Command::perform(
                async {
                    rfd::AsyncFileDialog::new()
                        .add_filter("Preset library", &["json"])
                        .pick_file()
                        .await
                        .map(|f| f.path().display().to_string())
                },
                Message::PresetFilePicked,
            ),
            Message::PresetFilePicked(path) => {
                if let Some(path) = path {
                    let loaded = fs::read_to_string(&path)
                        .map_err(|e| e.to_string())
                        .and_then(|data| PresetLibrary::from_json(&data).map_err(|e| e.to_string()));
                    match loaded {
                        Ok(presets) => {
                            self.status = format!("Loaded {} presets", presets.len());
                            info!(path = %path, "preset library loaded");
                            self.engine.load_presets(presets);
                        }
                        Err(e) => self.status = format!("Preset load failed: {}", e),
                    }
                }
                Command::none()
            }
            Message::PlayToggled => {
                let playing = !self.engine.is_playing();
                self.run(EngineCommand::SetPlaying { playing });
                Command::none()
            }
            Message::AutoBalanceChanged(active) => {
                self.run(EngineCommand::SetAutoBalance { active });
                Command::none()
            }
            Message::MicLevelChanged(level) => {
                self.run(EngineCommand::SetMixerLevel { channel: MIC, level });
                Command::none()
            }
            Message::ProgramFaderChanged(fader) => {
                self.run(EngineCommand::SetMixerFader { channel: PROGRAM, fader });
                Command::none()
            }
            Message::ResetChain(chain) => {
                self.run(EngineCommand::RestoreChain { chain });
                self.status = format!("{} chain reset", chain.label());
                Command::none()
            }
        }
    }

    fn view(&self) -> Element<'_, Self::Message> {
        let chain_id = self.chain_selected;
        let Ok(chain) = self.engine.chain(chain_id) else {
            return container(text(format!("{} chain unavailable", chain_id.label())))
                .padding(24)
                .style(theme::Container::from(body_style))
                .into();
        };

        let chain_button = |id: ChainId| {
            let selected = chain_id == id;
            button(text(id.label()).size(14))
                .padding([8, 14])
                .style(theme::Button::Custom(Box::new(TabButton { selected })))
                .on_press(Message::ChainSelected(id))
        };

        let playing = self.engine.is_playing();
        let hero = container(
            row![
                text("Pulse FM Processing Chain").size(22).style(color_text()),
                if playing {
                    pill("PLAYING", color_live(), color_bg())
                } else {
                    pill("PAUSED", color_surface_alt(), color_muted())
                },
                if chain.enabled() {
                    pill("CHAIN ON", color_accent(), color_bg())
                } else {
                    pill("CHAIN OFF", color_danger(), Color::WHITE)
                },
                text(&self.status).size(13).style(color_muted()),
            ]
            .spacing(14)
            .align_items(Alignment::Center),
        )
        .padding(16)
        .width(Length::Fill)
        .style(theme::Container::from(hero_style));

        let chains = row![
            chain_button(ChainId::Broadcast),
            chain_button(ChainId::Spatial),
            checkbox("Chain enabled", chain.enabled(), move |v| Message::ChainToggled(chain_id, v)),
            button(text(if playing { "Pause" } else { "Play" }))
                .padding(10)
                .style(theme::Button::Custom(Box::new(PrimaryButton)))
                .on_press(Message::PlayToggled),
            button(text("Reset"))
                .padding(10)
                .style(theme::Button::Custom(Box::new(DangerButton)))
                .on_press(Message::ResetChain(chain_id)),
        ]
        .spacing(10)
        .align_items(Alignment::Center);

        let tab_buttons = tabs_for(chain_id).iter().fold(Row::new().spacing(8), |r, tab| {
            let selected = chain.active_tab() == *tab;
            r.push(
                button(text(tab.to_string()).size(13))
                    .padding([6, 12])
                    .style(theme::Button::Custom(Box::new(TabButton { selected })))
                    .on_press(Message::TabSelected(chain_id, *tab)),
            )
        });
        let active_id = surface_id(chain_id, chain.active_tab());
        let scope: Element<'_, Message> = match self.buffers.get(&active_id) {
            Some(buffer) => Canvas::new(ListView {
                buffer: buffer.clone(),
            })
            .width(Length::Fill)
            .height(Length::Fixed(SCOPE_HEIGHT))
            .into(),
            None => text("No surface").style(color_muted()).into(),
        };
        let viz_card = card_accent("Visualization", column![tab_buttons, scope]);

        let presets_card = card(
            "Presets",
            column![
                row![
                    text("Preset:"),
                    pick_list(self.preset_items(), self.preset_selected.clone(), Message::PresetSelected),
                    button(text("Apply"))
                        .style(theme::Button::Custom(Box::new(PrimaryButton)))
                        .on_press(Message::ApplyPreset),
                    button(text("Load library…"))
                        .style(theme::Button::Custom(Box::new(GhostButton)))
                        .on_press(Message::BrowsePresets),
                ]
                .spacing(10)
                .align_items(Alignment::Center),
                text(
                    self.preset_selected
                        .as_ref()
                        .and_then(|item| self.engine.presets().get(chain_id, &item.id))
                        .map(|p| p.description.clone())
                        .unwrap_or_default()
                )
                .size(13)
                .style(color_muted()),
            ],
        );

        let mixer = self.engine.mixer();
        let mic = &mixer.channels()[MIC];
        let program = &mixer.channels()[PROGRAM];
        let mixer_card = card(
            "Studio Mixer",
            column![
                checkbox("Auto balance", mixer.auto_balance(), Message::AutoBalanceChanged),
                row![
                    text("Mic").width(Length::Fixed(70.0)),
                    slider(0.0..=100.0, mic.level, Message::MicLevelChanged),
                    text(format!("{:.0}", mic.level)).width(Length::Fixed(40.0)),
                ]
                .spacing(10)
                .align_items(Alignment::Center),
                row![
                    text("Program").width(Length::Fixed(70.0)),
                    slider(0.0..=100.0, program.fader, Message::ProgramFaderChanged),
                    text(format!("{:.0}", program.level)).width(Length::Fixed(40.0)),
                    if mixer.is_ducked() {
                        pill("DUCKED", color_accent_warm(), color_bg())
                    } else {
                        pill("NORMAL", color_surface_alt(), color_muted())
                    },
                ]
                .spacing(10)
                .align_items(Alignment::Center),
            ],
        );

        let modules = chain
            .modules()
            .iter()
            .fold(Column::new().spacing(16), |col, m| col.push(module_card(chain_id, m)));

        let body = row![
            column![viz_card, presets_card, mixer_card].spacing(16).width(Length::FillPortion(3)),
            modules.width(Length::FillPortion(2)),
        ]
        .spacing(16)
        .align_items(Alignment::Start);

        let content = column![hero, chains, body]
            .spacing(18)
            .padding(24)
            .width(Length::Fill)
            .align_items(Alignment::Start);

        let scroll = scrollable(content).width(Length::Fill).height(Length::Fill);

        container(scroll)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x()
            .style(theme::Container::from(body_style))
            .into()
    }
}

fn module_card<'a>(chain: ChainId, module: &ProcessingModule) -> Element<'a, Message> {
    let id = module.id();
    let mut content = Column::new().push(checkbox("Enabled", module.enabled(), move |v| {
        Message::ModuleToggled(chain, id, v)
    }));
    for spec in id.specs() {
        content = push_param(content, chain, module, spec, spec.name.to_string());
    }
    if module.enabled() {
        card(id.label(), content)
    } else {
        card(&format!("{} (off)", id.label()), content)
    }
}

fn push_param<'a>(
    content: Column<'a, Message>,
    chain: ChainId,
    module: &ProcessingModule,
    spec: &'static ParamSpec,
    path: String,
) -> Column<'a, Message> {
    let id = module.id();
    let editable = module.is_editable(&path);
    let label = text(spec.label).width(Length::Fixed(140.0));
    match spec.domain {
        ParamDomain::Range { min, max, step, .. } => {
            let value = module.number(&path);
            let shown = if id == ModuleId::RdsEncoder && path == "pty" {
                format!("{:.0} {}", value, pty_label(value as u8))
            } else {
                format!("{} {}", value, spec.unit)
            };
            let control: Element<'a, Message> = if editable {
                let p = path.clone();
                slider(min..=max, value, move |v| Message::NumberChanged(chain, id, p.clone(), v))
                    .step(step)
                    .into()
            } else {
                text("locked").style(color_muted()).into()
            };
            content.push(
                row![label, control, text(shown).size(13).style(color_muted())]
                    .spacing(10)
                    .align_items(Alignment::Center),
            )
        }
        ParamDomain::Choice { options, .. } => {
            let current = module.choice(&path).to_string();
            let control: Element<'a, Message> = if editable {
                let p = path.clone();
                pick_list(
                    options.iter().map(|o| o.to_string()).collect::<Vec<_>>(),
                    Some(current),
                    move |v| Message::ChoiceChanged(chain, id, p.clone(), v),
                )
                .into()
            } else {
                text(current).style(color_muted()).into()
            };
            content.push(row![label, control].spacing(10).align_items(Alignment::Center))
        }
        ParamDomain::Toggle { .. } => {
            let value = module.toggle(&path);
            let control: Element<'a, Message> = if editable {
                let p = path.clone();
                checkbox("", value, move |v| Message::ToggleChanged(chain, id, p.clone(), v)).into()
            } else {
                text(if value { "on" } else { "off" }).style(color_muted()).into()
            };
            content.push(row![label, control].spacing(10).align_items(Alignment::Center))
        }
        ParamDomain::Group(children) => {
            let mut content = content.push(text(spec.label).size(13).style(color_accent()));
            for child in children {
                content = push_param(content, chain, module, child, format!("{}.{}", path, child.name));
            }
            content
        }
    }
}

fn card<'a>(title: &str, content: Column<'a, Message>) -> Element<'a, Message> {
    container(
        column![
            container(text(title).size(15).style(color_text()))
                .padding([6, 10])
                .width(Length::Fill)
                .style(theme::Container::from(header_style)),
            content.spacing(12),
        ]
        .spacing(12),
    )
    .padding(14)
    .width(Length::Fill)
    .style(theme::Container::from(card_style))
    .into()
}

fn card_accent<'a>(title: &str, content: Column<'a, Message>) -> Element<'a, Message> {
    container(
        column![
            container(text(title).size(15).style(color_text()))
                .padding([6, 10])
                .width(Length::Fill)
                .style(theme::Container::from(header_style)),
            content.spacing(12),
        ]
        .spacing(12),
    )
    .padding(14)
    .width(Length::Fill)
    .style(theme::Container::from(card_accent_style))
    .into()
}

fn header_style(_theme: &Theme) -> container_widget::Appearance {
    container_widget::Appearance {
        background: Some(Background::Color(color_surface_alt())),
        text_color: Some(color_text()),
        border_radius: 10.0.into(),
        border_width: 1.0,
        border_color: color_border(),
    }
}

fn card_style(_theme: &Theme) -> container_widget::Appearance {
    container_widget::Appearance {
        background: Some(Background::Color(color_surface())),
        text_color: Some(color_text()),
        border_radius: 14.0.into(),
        border_width: 1.0,
        border_color: color_border(),
    }
}

fn card_accent_style(_theme: &Theme) -> container_widget::Appearance {
    container_widget::Appearance {
        background: Some(Background::Color(color_surface())),
        text_color: Some(color_text()),
        border_radius: 14.0.into(),
        border_width: 2.0,
        border_color: color_accent(),
    }
}

fn hero_style(_theme: &Theme) -> container_widget::Appearance {
    container_widget::Appearance {
        background: Some(Background::Color(color_surface())),
        text_color: Some(color_text()),
        border_radius: 16.0.into(),
        border_width: 1.0,
        border_color: color_accent(),
    }
}

fn body_style(_theme: &Theme) -> container_widget::Appearance {
    container_widget::Appearance {
        background: Some(Background::Color(color_bg())),
        text_color: Some(color_text()),
        ..Default::default()
    }
}

fn pill<'a>(label: &str, bg: Color, fg: Color) -> Element<'a, Message> {
    container(text(label).size(12))
        .padding([4, 10])
        .style(theme::Container::Custom(Box::new(PillStyle { bg, fg })))
        .into()
}

struct PrimaryButton;

impl button_widget::StyleSheet for PrimaryButton {
    type Style = Theme;

    fn active(&self, _style: &Self::Style) -> button_widget::Appearance {
        button_widget::Appearance {
            background: Some(Background::Color(color_accent())),
            text_color: Color::from_rgb8(6, 16, 20),
            border_radius: 10.0.into(),
            border_width: 1.0,
            border_color: color_accent(),
            ..Default::default()
        }
    }

    fn hovered(&self, style: &Self::Style) -> button_widget::Appearance {
        let mut active = self.active(style);
        active.background = Some(Background::Color(Color::from_rgb8(74, 222, 239)));
        active
    }

    fn pressed(&self, style: &Self::Style) -> button_widget::Appearance {
        let mut active = self.active(style);
        active.background = Some(Background::Color(Color::from_rgb8(22, 189, 214)));
        active
    }
}

struct GhostButton;

impl button_widget::StyleSheet for GhostButton {
    type Style = Theme;

    fn active(&self, _style: &Self::Style) -> button_widget::Appearance {
        button_widget::Appearance {
            background: Some(Background::Color(color_surface_alt())),
            text_color: color_text(),
            border_radius: 10.0.into(),
            border_width: 1.0,
            border_color: color_border(),
            ..Default::default()
        }
    }

    fn hovered(&self, style: &Self::Style) -> button_widget::Appearance {
        let mut active = self.active(style);
        active.background = Some(Background::Color(Color::from_rgb8(36, 46, 60)));
        active
    }
}

struct DangerButton;

impl button_widget::StyleSheet for DangerButton {
    type Style = Theme;

    fn active(&self, _style: &Self::Style) -> button_widget::Appearance {
        button_widget::Appearance {
            background: Some(Background::Color(color_danger())),
            text_color: Color::WHITE,
            border_radius: 10.0.into(),
            border_width: 1.0,
            border_color: color_danger(),
            ..Default::default()
        }
    }

    fn hovered(&self, style: &Self::Style) -> button_widget::Appearance {
        let mut active = self.active(style);
        active.background = Some(Background::Color(Color::from_rgb8(248, 113, 113)));
        active
    }
}

struct TabButton {
    selected: bool,
}

impl button_widget::StyleSheet for TabButton {
    type Style = Theme;

    fn active(&self, _style: &Self::Style) -> button_widget::Appearance {
        let (bg, text_color, border_color) = if self.selected {
            (color_accent(), Color::from_rgb8(6, 16, 20), color_accent())
        } else {
            (color_surface_alt(), color_text(), color_border())
        };
        button_widget::Appearance {
            background: Some(Background::Color(bg)),
            text_color,
            border_radius: 10.0.into(),
            border_width: 1.0,
            border_color,
            ..Default::default()
        }
    }

    fn hovered(&self, style: &Self::Style) -> button_widget::Appearance {
        let mut active = self.active(style);
        if !self.selected {
            active.background = Some(Background::Color(Color::from_rgb8(36, 46, 60)));
        }
        active
    }
}

struct PillStyle {
    bg: Color,
    fg: Color,
}

impl container_widget::StyleSheet for PillStyle {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> container_widget::Appearance {
        container_widget::Appearance {
            background: Some(Background::Color(self.bg)),
            text_color: Some(self.fg),
            border_radius: 999.0.into(),
            border_width: 1.0,
            border_color: self.bg,
        }
    }
}

/// Paints the display list last presented to a surface, scaled to the
/// canvas bounds, and records those bounds for the next frame's resize.
struct ListView {
    buffer: FrameBuffer,
}

/// Linear interpolation across ordered gradient stops.
fn gradient_at(stops: &[(f32, Rgba)], t: f32) -> Color {
    let Some(first) = stops.first() else {
        return Color::TRANSPARENT;
    };
    let mut prev = *first;
    for stop in stops {
        if t <= stop.0 {
            let span = (stop.0 - prev.0).max(f32::EPSILON);
            let k = ((t - prev.0) / span).clamp(0.0, 1.0);
            let (a, b) = (to_color(prev.1), to_color(stop.1));
            return Color::from_rgba(
                a.r + (b.r - a.r) * k,
                a.g + (b.g - a.g) * k,
                a.b + (b.b - a.b) * k,
                a.a + (b.a - a.a) * k,
            );
        }
        prev = *stop;
    }
    to_color(prev.1)
}

impl Program<Message, Renderer> for ListView {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: iced::Rectangle,
        _cursor: iced::mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        self.buffer.0.borrow_mut().canvas = Some((bounds.width, bounds.height));
        let painted = self.buffer.0.borrow();
        let sx = if painted.size.width > 0.0 { bounds.width / painted.size.width } else { 1.0 };
        let sy = if painted.size.height > 0.0 { bounds.height / painted.size.height } else { 1.0 };
        let pt = |p: pulse_fm_chain::render::Point| iced::Point::new(p.x * sx, p.y * sy);

        for cmd in &painted.list {
            match cmd {
                DrawCommand::Clear { color } => {
                    let bg = Path::rectangle(iced::Point::ORIGIN, frame.size());
                    frame.fill(&bg, to_color(*color));
                }
                DrawCommand::FillRect { rect, color } => {
                    let path = Path::rectangle(
                        iced::Point::new(rect.x * sx, rect.y * sy),
                        iced::Size::new(rect.width * sx, rect.height * sy),
                    );
                    frame.fill(&path, to_color(*color));
                }
                DrawCommand::GradientRect { rect, stops, extent } => {
                    let painted_w = rect.width * extent.clamp(0.0, 1.0);
                    let slice = rect.width / GRADIENT_SLICES as f32;
                    let count = (painted_w / slice).ceil() as usize;
                    for i in 0..count {
                        let x0 = i as f32 * slice;
                        let w = slice.min(painted_w - x0);
                        let path = Path::rectangle(
                            iced::Point::new((rect.x + x0) * sx, rect.y * sy),
                            iced::Size::new(w * sx + 0.5, rect.height * sy),
                        );
                        frame.fill(&path, gradient_at(stops, (x0 + w / 2.0) / rect.width));
                    }
                }
                DrawCommand::Line { from, to, color, width } => {
                    let line = Path::line(pt(*from), pt(*to));
                    frame.stroke(&line, Stroke::default().with_width(*width).with_color(to_color(*color)));
                }
                DrawCommand::Polyline { points, color, width } => {
                    if points.len() < 2 {
                        continue;
                    }
                    let path = Path::new(|builder| {
                        for (i, p) in points.iter().enumerate() {
                            if i == 0 {
                                builder.move_to(pt(*p));
                            } else {
                                builder.line_to(pt(*p));
                            }
                        }
                    });
                    frame.stroke(&path, Stroke::default().with_width(*width).with_color(to_color(*color)));
                }
                DrawCommand::Circle { center, radius, color, filled } => {
                    let circle = Path::circle(pt(*center), radius * sx.min(sy));
                    if *filled {
                        frame.fill(&circle, to_color(*color));
                    } else {
                        frame.stroke(&circle, Stroke::default().with_width(1.0).with_color(to_color(*color)));
                    }
                }
                DrawCommand::Text { content, position, size, color } => {
                    frame.fill_text(Text {
                        content: content.clone(),
                        position: pt(*position),
                        color: to_color(*color),
                        size: *size,
                        ..Text::default()
                    });
                }
            }
        }

        vec![frame.into_geometry()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iced::Application;

    fn app(scale: f32) -> App {
        let (app, _) = App::new(EngineConfig {
            seed: Some(3),
            display_scale: scale,
            ..EngineConfig::default()
        });
        app
    }

    #[test]
    fn test_surfaces_use_display_scale() {
        let app = app(2.0);
        let id = surface_id(ChainId::Spatial, VisualizationTab::Phase);
        let surface = app.engine.scheduler().surface(&id).unwrap();
        assert_eq!(surface.scale(), 2.0);
        assert_eq!(surface.backing_size(), SurfaceSize::new(1280.0, 2.0 * SCOPE_HEIGHT));
        assert_eq!(app.scale_factor(), 2.0);
    }

    #[test]
    fn test_canvas_layout_resizes_surface_without_input() {
        let mut app = app(2.0);
        let id = surface_id(ChainId::Broadcast, VisualizationTab::Spectrum);
        app.buffers[&id].0.borrow_mut().canvas = Some((300.0, 200.0));

        app.sync_surfaces();
        let surface = app.engine.scheduler().surface(&id).unwrap();
        assert_eq!(surface.logical_size(), SurfaceSize::new(300.0, 200.0));
        assert_eq!(surface.backing_size(), SurfaceSize::new(600.0, 400.0));
        assert_eq!(app.buffers[&id].0.borrow().size, SurfaceSize::new(600.0, 400.0));

        // untouched canvases keep their registration size
        let other = surface_id(ChainId::Spatial, VisualizationTab::Vectorscope);
        let surface = app.engine.scheduler().surface(&other).unwrap();
        assert_eq!(surface.logical_size(), SurfaceSize::new(640.0, SCOPE_HEIGHT));
    }

    #[test]
    fn test_needs_resize_tolerates_subpixel_jitter() {
        let app = app(1.0);
        let id = surface_id(ChainId::Broadcast, VisualizationTab::Meters);
        let surface = app.engine.scheduler().surface(&id).unwrap();
        assert!(!needs_resize(surface, 640.2, SCOPE_HEIGHT, 1.0));
        assert!(needs_resize(surface, 700.0, SCOPE_HEIGHT, 1.0));
        assert!(needs_resize(surface, 640.0, SCOPE_HEIGHT, 1.5));
    }
}
