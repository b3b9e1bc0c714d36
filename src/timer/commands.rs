use crate::{
    audio::SoundId,
    settings::validation,
    timer::{SessionType, TimerController, TimerSnapshot},
    AppState,
};

fn controller_from_state(state: &AppState) -> TimerController {
    state.timer.clone()
}

pub async fn get_timer_state(state: &AppState) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.get_snapshot().await)
}

pub async fn start_timer(state: &AppState) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(state);
    controller.start().await.map_err(|e| e.to_string())
}

pub async fn pause_timer(state: &AppState) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.pause().await)
}

pub async fn reset_timer(state: &AppState) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.reset().await)
}

pub async fn select_session(
    state: &AppState,
    session_type: SessionType,
) -> Result<TimerSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.select_session(session_type).await)
}

/// `minutes` is raw user input; anything but a positive whole number is
/// rejected and the caller should restore the previous value in its input.
pub async fn set_duration(
    state: &AppState,
    session_type: SessionType,
    minutes: &str,
) -> Result<TimerSnapshot, String> {
    let minutes = validation::parse_minutes(minutes).map_err(|e| e.to_string())?;
    let controller = controller_from_state(state);
    controller
        .set_duration(session_type, minutes)
        .await
        .map_err(|e| e.to_string())
}

pub async fn set_sound(state: &AppState, sound: &str) -> Result<TimerSnapshot, String> {
    let sound = sound.parse::<SoundId>().map_err(|e| e.to_string())?;
    let controller = controller_from_state(state);
    Ok(controller.set_sound(sound).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_app;

    #[tokio::test]
    async fn test_set_duration_rejects_bad_input() {
        let (app, _, _) = test_app();

        for input in ["", "abc", "0", "-5", "2.5"] {
            let err = set_duration(&app, SessionType::Focus, input).await.unwrap_err();
            assert!(err.contains("positive"), "unexpected message for {input:?}: {err}");
        }

        let snapshot = get_timer_state(&app).await.unwrap();
        assert_eq!(snapshot.state.config.focus_secs, 25 * 60);
        assert_eq!(snapshot.state.remaining_secs, 25 * 60);

        let snapshot = set_duration(&app, SessionType::Focus, " 10 ").await.unwrap();
        assert_eq!(snapshot.state.remaining_secs, 600);
    }

    #[tokio::test]
    async fn test_set_sound_rejects_unknown() {
        let (app, _, _) = test_app();
        assert!(set_sound(&app, "kazoo").await.is_err());

        let snapshot = set_sound(&app, "/sounds/Bell.wav").await.unwrap();
        assert_eq!(snapshot.state.sound, SoundId::Bell);
    }
}
