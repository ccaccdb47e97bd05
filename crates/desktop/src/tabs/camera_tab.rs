use iced::widget::{button, column, container, image, row, text, Space};
use iced::{Alignment, Element, Length};

use facecam_core::controller::phase::UiPhase;
use facecam_core::controller::view_controller::PendingOperation;

use crate::app::{App, Message};

/// One control set per phase: start, capture/close, retake/save.
pub fn view(app: &App) -> Element<'_, Message> {
    let controller = &app.controller;
    let busy = controller.is_busy();

    let (picture, controls): (Element<'_, Message>, Element<'_, Message>) =
        match controller.phase() {
            UiPhase::Idle => {
                let hint = match controller.pending() {
                    Some(PendingOperation::Starting) => "Starting camera...",
                    _ => "Camera is off.",
                };
                (
                    placeholder(hint),
                    row![action("Start camera", (!busy).then_some(Message::StartCamera))]
                        .into(),
                )
            }
            UiPhase::Live => {
                let picture = match &app.preview {
                    Some(preview) => frame_view(preview.handle.clone()),
                    None => placeholder("Waiting for the first frame..."),
                };
                (
                    picture,
                    row![
                        action("Capture", (!busy).then_some(Message::Capture)),
                        action("Close camera", Some(Message::CloseCamera)),
                    ]
                    .spacing(12)
                    .into(),
                )
            }
            UiPhase::Captured => {
                let picture = match &app.photo {
                    Some(photo) => frame_view(photo.clone()),
                    None => placeholder("No photo."),
                };
                (
                    picture,
                    row![
                        action("Retake", (!busy).then_some(Message::Retake)),
                        action("Save photo...", Some(Message::SavePhoto)),
                    ]
                    .spacing(12)
                    .into(),
                )
            }
        };

    let mut notes = column![].spacing(4);
    if let Some(status) = controller.status() {
        notes = notes.push(text(status.to_string()).size(14));
    }
    if let Some(alert) = &app.alert {
        notes = notes.push(text(alert).size(14).style(text::danger));
    }
    if let Some(error) = &app.save_error {
        notes = notes.push(text(error).size(13).style(text::danger));
    }

    column![
        picture,
        Space::new().height(12),
        notes,
        Space::new().height(12),
        controls,
    ]
    .align_x(Alignment::Center)
    .width(Length::Fill)
    .into()
}

fn frame_view<'a>(handle: image::Handle) -> Element<'a, Message> {
    container(image(handle).width(Length::Fill).height(Length::Fill))
        .center_x(Length::Fill)
        .height(Length::FillPortion(5))
        .into()
}

fn placeholder<'a>(hint: &'a str) -> Element<'a, Message> {
    container(text(hint).size(15))
        .center_x(Length::Fill)
        .center_y(Length::FillPortion(5))
        .into()
}

fn action<'a>(label: &'a str, on_press: Option<Message>) -> Element<'a, Message> {
    button(text(label).size(14))
        .on_press_maybe(on_press)
        .padding([8, 18])
        .style(button::primary)
        .into()
}
