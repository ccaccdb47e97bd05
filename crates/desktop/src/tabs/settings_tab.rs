use iced::widget::{checkbox, column, pick_list, row, text, Space};
use iced::{Alignment, Element};

use facecam_core::controller::view_controller::ViewController;
use facecam_core::detection::domain::model_state::ModelState;

use crate::app::Message;
use crate::settings::{Appearance, Settings};

pub fn view<'a>(settings: &Settings, controller: &ViewController) -> Element<'a, Message> {
    let model = match controller.detector().model_state() {
        ModelState::NotLoaded => "Face model: loads on first capture",
        ModelState::Loading => "Face model: loading...",
        ModelState::Ready => "Face model: ready",
        ModelState::FailedToLoad => "Face model: failed to load, retried on next capture",
    };

    column![
        text("Theme").size(16),
        Space::new().height(8),
        row![
            text("Mode").size(13),
            pick_list(Appearance::ALL, Some(settings.appearance), Message::AppearanceChanged)
                .text_size(13),
        ]
        .spacing(12)
        .align_y(Alignment::Center),
        Space::new().height(12),
        checkbox(settings.high_contrast)
            .label("High contrast")
            .on_toggle(Message::HighContrastChanged)
            .text_size(13),
        Space::new().height(20),
        text("Face detection").size(16),
        Space::new().height(8),
        checkbox(settings.face_detection)
            .label("Mark faces in captured photos")
            .on_toggle(Message::FaceDetectionChanged)
            .text_size(13),
        Space::new().height(6),
        text(model).size(12),
    ]
    .into()
}
