mod app;
mod settings;
mod tabs;
mod theme;

use app::App;

fn main() -> iced::Result {
    env_logger::init();

    iced::application(App::new, App::update, App::view)
        .title("Facecam")
        .theme(App::theme)
        .subscription(App::subscription)
        .window(iced::window::Settings {
            size: iced::Size::new(720.0, 640.0),
            ..Default::default()
        })
        .run()
}
