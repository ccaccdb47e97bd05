use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use iced::widget::{button, column, container, image, row, text};
use iced::{Element, Length, Subscription, Task, Theme};

use facecam_core::camera::infrastructure::ffmpeg_camera::FfmpegCamera;
use facecam_core::controller::phase::UiPhase;
use facecam_core::controller::view_controller::{
    CaptureOutcome, Completion, StartOutcome, ViewController,
};
use facecam_core::shared::config::FacecamConfig;

use crate::settings::{Appearance, Settings};
use crate::tabs;
use crate::theme;

/// Preview refresh rate while the camera is live.
const PREVIEW_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Camera,
    Settings,
}

impl Tab {
    const ALL: &[Tab] = &[Tab::Camera, Tab::Settings];

    fn label(self) -> &'static str {
        match self {
            Tab::Camera => "Camera",
            Tab::Settings => "Settings",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(Tab),
    StartCamera,
    CameraStarted(StartOutcome),
    Capture,
    CaptureFinished(CaptureOutcome),
    CloseCamera,
    Retake,
    SavePhoto,
    SaveTargetChosen(Option<PathBuf>),
    AlertDismissed,
    PreviewTick,
    AppearanceChanged(Appearance),
    HighContrastChanged(bool),
    FaceDetectionChanged(bool),
    PollSystemTheme,
}

/// Latest preview frame, converted for display.
pub struct Preview {
    pub handle: image::Handle,
    sequence: u64,
}

pub struct App {
    active_tab: Tab,
    pub settings: Settings,
    pub controller: ViewController,
    pub preview: Option<Preview>,
    pub photo: Option<image::Handle>,
    pub alert: Option<String>,
    pub save_error: Option<String>,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let settings = Settings::default();
        let mut config = FacecamConfig::default();
        config.detection.enabled = settings.face_detection;
        let camera = Arc::new(FfmpegCamera::new(config.camera.clone()));

        (
            Self {
                active_tab: Tab::Camera,
                settings,
                controller: ViewController::from_config(camera, &config),
                preview: None,
                photo: None,
                alert: None,
                save_error: None,
            },
            Task::none(),
        )
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(tab) => {
                self.active_tab = tab;
            }
            Message::StartCamera => match self.controller.begin_start() {
                Ok(request) => return Task::perform(request.run(), Message::CameraStarted),
                Err(e) => log::warn!("Camera request rejected: {e}"),
            },
            Message::Retake => match self.controller.begin_retake() {
                Ok(request) => {
                    self.photo = None;
                    self.save_error = None;
                    return Task::perform(request.run(), Message::CameraStarted);
                }
                Err(e) => log::warn!("Retake rejected: {e}"),
            },
            Message::CameraStarted(outcome) => {
                if let Err(e) = self.controller.finish_start(outcome) {
                    log::error!("Could not start camera: {e}");
                    return self.show_alert();
                }
            }
            Message::Capture => match self.controller.begin_capture() {
                Ok(request) => return Task::perform(request.run(), Message::CaptureFinished),
                Err(e) => log::warn!("Capture rejected: {e}"),
            },
            Message::CaptureFinished(outcome) => match self.controller.finish_capture(outcome) {
                Ok(Completion::Applied) => {
                    self.preview = None;
                    self.photo = self
                        .controller
                        .captured_image()
                        .map(|img| image::Handle::from_bytes(img.png_bytes().to_vec()));
                }
                Ok(Completion::Discarded) => {}
                Err(e) => log::warn!("Capture failed: {e}"),
            },
            Message::CloseCamera => {
                if let Err(e) = self.controller.close() {
                    log::warn!("Close rejected: {e}");
                }
                self.preview = None;
            }
            Message::SavePhoto => {
                return Task::perform(
                    async {
                        rfd::AsyncFileDialog::new()
                            .set_title("Save photo as")
                            .add_filter("PNG image", &["png"])
                            .set_file_name("photo.png")
                            .save_file()
                            .await
                            .map(|h| h.path().to_path_buf())
                    },
                    Message::SaveTargetChosen,
                );
            }
            Message::SaveTargetChosen(Some(path)) => {
                self.save_error = match self.controller.captured_image() {
                    Some(img) => img.save(&path).err().map(|e| e.to_string()),
                    None => None,
                };
                if let Some(e) = &self.save_error {
                    log::error!("{e}");
                }
            }
            Message::SaveTargetChosen(None) => {}
            Message::AlertDismissed => {
                self.alert = None;
            }
            Message::PreviewTick => self.refresh_preview(),
            Message::AppearanceChanged(appearance) => {
                self.settings.appearance = appearance;
            }
            Message::HighContrastChanged(enabled) => {
                self.settings.high_contrast = enabled;
            }
            Message::FaceDetectionChanged(enabled) => {
                self.settings.face_detection = enabled;
                self.controller.set_detection_enabled(enabled);
            }
            Message::PollSystemTheme => {
                // theme() re-resolves on every render
            }
        }
        Task::none()
    }

    fn show_alert(&mut self) -> Task<Message> {
        let Some(alert) = self.controller.take_alert() else {
            return Task::none();
        };
        self.alert = Some(alert.clone());
        Task::perform(
            async move {
                rfd::AsyncMessageDialog::new()
                    .set_level(rfd::MessageLevel::Warning)
                    .set_title("Camera")
                    .set_description(alert)
                    .set_buttons(rfd::MessageButtons::Ok)
                    .show()
                    .await
            },
            |_| Message::AlertDismissed,
        )
    }

    fn refresh_preview(&mut self) {
        let Some(frame) = self.controller.surface().current_frame() else {
            return;
        };
        let fresh = self
            .preview
            .as_ref()
            .map_or(true, |p| p.sequence != frame.sequence());
        if fresh {
            self.preview = Some(Preview {
                handle: image::Handle::from_rgba(frame.width(), frame.height(), frame.to_rgba()),
                sequence: frame.sequence(),
            });
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let tab_bar = row(Tab::ALL
            .iter()
            .map(|&tab| {
                let btn = button(text(tab.label()).size(13))
                    .on_press(Message::TabSelected(tab))
                    .padding([6, 14]);
                if tab == self.active_tab {
                    btn.style(button::primary).into()
                } else {
                    btn.style(button::text).into()
                }
            })
            .collect::<Vec<_>>())
        .spacing(2);

        let content: Element<'_, Message> = match self.active_tab {
            Tab::Camera => tabs::camera_tab::view(self),
            Tab::Settings => tabs::settings_tab::view(&self.settings, &self.controller),
        };

        column![
            tab_bar,
            container(content).padding(16).height(Length::Fill)
        ]
        .height(Length::Fill)
        .into()
    }

    pub fn theme(&self) -> Theme {
        theme::resolve_theme(self.settings.appearance, self.settings.high_contrast)
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let preview = if self.controller.phase() == UiPhase::Live {
            iced::time::every(PREVIEW_INTERVAL).map(|_| Message::PreviewTick)
        } else {
            Subscription::none()
        };
        let system_theme = if self.settings.appearance == Appearance::System {
            iced::time::every(Duration::from_secs(2)).map(|_| Message::PollSystemTheme)
        } else {
            Subscription::none()
        };
        Subscription::batch([preview, system_theme])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_retake_keeps_photo() {
        let (mut app, _) = App::new();
        app.photo = Some(image::Handle::from_rgba(1, 1, vec![0, 0, 0, 255]));
        assert_eq!(app.controller.phase(), UiPhase::Idle);

        let _ = app.update(Message::Retake);

        assert!(app.photo.is_some());
        assert_eq!(app.controller.phase(), UiPhase::Idle);
    }

    #[test]
    fn test_detection_toggle_reaches_controller() {
        let (mut app, _) = App::new();
        let _ = app.update(Message::FaceDetectionChanged(false));
        assert!(!app.settings.face_detection);
        assert!(!app.controller.detection_enabled());
    }
}
