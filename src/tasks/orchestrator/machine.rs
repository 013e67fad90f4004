use std::mem;
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::events::{Event, PlaybackState, PlayerCommand};
use crate::player::PlayerError;
use crate::playlist::Playlist;

/// Command the actor has to hand to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start(PathBuf),
    Pause,
    Resume,
    Stop,
}

impl Action {
    pub fn command(&self) -> PlayerCommand {
        match self {
            Action::Start(_) => PlayerCommand::Start,
            Action::Pause => PlayerCommand::Pause,
            Action::Resume => PlayerCommand::Resume,
            Action::Stop => PlayerCommand::Stop,
        }
    }
}

/// Playback transition table.
///
/// At most one command is outstanding. Events that would need a command while
/// one is in flight are remembered and resolved in `settle` once the slot is
/// free again: a natural end of playback first, then a pending reset, then
/// pause/resume against the latest motion reading.
pub struct PlaybackSM {
    playlist: Playlist,
    state: PlaybackState,
    motion: bool,
    in_flight: Option<PlayerCommand>,
    ended: bool,
    reset_requested: bool,
}

impl PlaybackSM {
    pub fn new(playlist: Playlist) -> Self {
        Self {
            playlist,
            state: PlaybackState::Idle,
            motion: false,
            in_flight: None,
            ended: false,
            reset_requested: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn motion(&self) -> bool {
        self.motion
    }

    pub fn in_flight(&self) -> Option<PlayerCommand> {
        self.in_flight
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    /// Kicks off the first video. Only acts from a fresh `Idle`.
    pub fn on_startup(&mut self) -> Option<Action> {
        if self.state != PlaybackState::Idle || self.in_flight.is_some() {
            return None;
        }
        let video = self.playlist.current().to_path_buf();
        Some(self.begin_start(video))
    }

    pub fn on_event(&mut self, event: Event) -> Option<Action> {
        match event {
            Event::MotionChanged(motion) => self.on_motion(motion),
            Event::ResetPulse => self.on_reset(),
            Event::PlaybackStopped => self.on_stopped(),
            Event::CommandSucceeded(command) => self.on_command_succeeded(command),
            Event::CommandFailed(command, err) => self.on_command_failed(command, &err),
        }
    }

    fn on_motion(&mut self, motion: bool) -> Option<Action> {
        self.motion = motion;
        debug!(motion, state = ?self.state, "motion changed");
        self.settle()
    }

    fn on_reset(&mut self) -> Option<Action> {
        match self.state {
            PlaybackState::Stopping => {
                debug!("reset ignored; stop already in flight");
                None
            }
            PlaybackState::Idle => {
                info!("reset pressed while idle; starting next video");
                Some(self.start_next())
            }
            PlaybackState::Starting => {
                debug!("reset deferred until start completes");
                self.reset_requested = true;
                None
            }
            PlaybackState::Playing | PlaybackState::Paused => {
                self.reset_requested = true;
                self.settle()
            }
        }
    }

    fn on_stopped(&mut self) -> Option<Action> {
        if self.state == PlaybackState::Idle {
            debug!("playback stopped while idle; ignored");
            return None;
        }
        self.ended = true;
        self.settle()
    }

    fn on_command_succeeded(&mut self, command: PlayerCommand) -> Option<Action> {
        if self.in_flight != Some(command) {
            warn!(%command, in_flight = ?self.in_flight, "unexpected command acknowledgement");
            return None;
        }
        self.in_flight = None;
        debug!(%command, "player acknowledged command");

        if command == PlayerCommand::Start && self.state == PlaybackState::Starting {
            info!(video = %self.playlist.current().display(), "video started");
            self.state = PlaybackState::Playing;
        }
        self.settle()
    }

    fn on_command_failed(&mut self, command: PlayerCommand, err: &PlayerError) -> Option<Action> {
        if self.in_flight != Some(command) {
            warn!(%command, %err, in_flight = ?self.in_flight, "failure for unexpected command");
            return None;
        }
        self.in_flight = None;

        if command == PlayerCommand::Start {
            error!(
                video = %self.playlist.current().display(),
                %err,
                "failed to start video; waiting for reset"
            );
            self.state = PlaybackState::Idle;
            self.ended = false;
            self.reset_requested = false;
            return None;
        }

        warn!(%command, %err, state = ?self.state, "player command failed");
        self.settle()
    }

    fn settle(&mut self) -> Option<Action> {
        if self.in_flight.is_some() {
            return None;
        }
        match self.state {
            PlaybackState::Idle | PlaybackState::Starting => None,
            PlaybackState::Stopping => {
                if mem::take(&mut self.ended) {
                    info!("video stopped; starting next video");
                    Some(self.start_next())
                } else {
                    None
                }
            }
            PlaybackState::Playing | PlaybackState::Paused => {
                if mem::take(&mut self.ended) {
                    if mem::take(&mut self.reset_requested) {
                        debug!("reset coincided with end of video; advancing once");
                    }
                    info!("video finished; starting next video");
                    Some(self.start_next())
                } else if mem::take(&mut self.reset_requested) {
                    info!("reset pressed; stopping current video");
                    self.state = PlaybackState::Stopping;
                    Some(self.issue(Action::Stop))
                } else if self.state == PlaybackState::Playing && !self.motion {
                    info!("pausing video; no motion detected");
                    self.state = PlaybackState::Paused;
                    Some(self.issue(Action::Pause))
                } else if self.state == PlaybackState::Paused && self.motion {
                    info!("resuming video; motion detected");
                    self.state = PlaybackState::Playing;
                    Some(self.issue(Action::Resume))
                } else {
                    None
                }
            }
        }
    }

    fn start_next(&mut self) -> Action {
        let video = self.playlist.advance().to_path_buf();
        self.begin_start(video)
    }

    fn begin_start(&mut self, video: PathBuf) -> Action {
        info!(
            video = %video.display(),
            position = self.playlist.position(),
            of = self.playlist.len(),
            "starting video"
        );
        self.state = PlaybackState::Starting;
        self.issue(Action::Start(video))
    }

    fn issue(&mut self, action: Action) -> Action {
        self.in_flight = Some(action.command());
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> PlaybackSM {
        let playlist = Playlist::new(vec![
            PathBuf::from("V1"),
            PathBuf::from("V2"),
            PathBuf::from("V3"),
        ])
        .unwrap();
        PlaybackSM::new(playlist)
    }

    fn start(name: &str) -> Option<Action> {
        Some(Action::Start(PathBuf::from(name)))
    }

    fn ack(sm: &mut PlaybackSM, command: PlayerCommand) -> Option<Action> {
        sm.on_event(Event::CommandSucceeded(command))
    }

    /// Startup with the given motion, start acknowledged, any follow-up acknowledged.
    fn running(motion: bool) -> PlaybackSM {
        let mut sm = machine();
        sm.on_event(Event::MotionChanged(motion));
        assert_eq!(sm.on_startup(), start("V1"));
        if let Some(next) = ack(&mut sm, PlayerCommand::Start) {
            ack(&mut sm, next.command());
        }
        assert!(sm.in_flight().is_none());
        sm
    }

    #[test]
    fn startup_without_motion_starts_then_pauses() {
        let mut sm = machine();
        assert_eq!(sm.on_startup(), start("V1"));
        assert_eq!(sm.state(), PlaybackState::Starting);
        assert_eq!(ack(&mut sm, PlayerCommand::Start), Some(Action::Pause));
        assert_eq!(sm.state(), PlaybackState::Paused);
        assert!(!sm.motion());
    }

    #[test]
    fn startup_with_motion_plays() {
        let mut sm = machine();
        sm.on_event(Event::MotionChanged(true));
        assert_eq!(sm.on_startup(), start("V1"));
        assert_eq!(ack(&mut sm, PlayerCommand::Start), None);
        assert_eq!(sm.state(), PlaybackState::Playing);
    }

    #[test]
    fn motion_resumes_paused_video() {
        let mut sm = running(false);
        assert_eq!(sm.state(), PlaybackState::Paused);
        assert_eq!(
            sm.on_event(Event::MotionChanged(true)),
            Some(Action::Resume)
        );
        assert_eq!(sm.state(), PlaybackState::Playing);
        assert_eq!(ack(&mut sm, PlayerCommand::Resume), None);
        assert_eq!(
            sm.on_event(Event::MotionChanged(false)),
            Some(Action::Pause)
        );
        assert_eq!(sm.state(), PlaybackState::Paused);
    }

    #[test]
    fn natural_end_advances_regardless_of_motion() {
        let mut sm = running(true);
        assert_eq!(sm.on_event(Event::PlaybackStopped), start("V2"));
        assert_eq!(sm.state(), PlaybackState::Starting);

        // Motion dropped while starting: absorbed, applied once started.
        assert_eq!(sm.on_event(Event::MotionChanged(false)), None);
        assert_eq!(ack(&mut sm, PlayerCommand::Start), Some(Action::Pause));
        assert_eq!(sm.state(), PlaybackState::Paused);

        ack(&mut sm, PlayerCommand::Pause);
        assert_eq!(sm.on_event(Event::PlaybackStopped), start("V3"));
    }

    #[test]
    fn reset_stops_then_advances_on_stopped() {
        let mut sm = running(true);
        sm.on_event(Event::PlaybackStopped);
        ack(&mut sm, PlayerCommand::Start);
        assert_eq!(sm.playlist().current(), PathBuf::from("V2").as_path());

        assert_eq!(sm.on_event(Event::ResetPulse), Some(Action::Stop));
        assert_eq!(sm.state(), PlaybackState::Stopping);
        assert_eq!(ack(&mut sm, PlayerCommand::Stop), None);
        assert_eq!(sm.on_event(Event::PlaybackStopped), start("V3"));
        assert_eq!(sm.state(), PlaybackState::Starting);

        ack(&mut sm, PlayerCommand::Start);
        assert_eq!(sm.on_event(Event::PlaybackStopped), start("V1"));
    }

    #[test]
    fn reset_while_stopping_is_ignored() {
        let mut sm = running(true);
        assert_eq!(sm.on_event(Event::ResetPulse), Some(Action::Stop));
        assert_eq!(sm.on_event(Event::ResetPulse), None);
        ack(&mut sm, PlayerCommand::Stop);
        assert_eq!(sm.on_event(Event::ResetPulse), None);
        assert_eq!(sm.state(), PlaybackState::Stopping);
        assert_eq!(sm.on_event(Event::PlaybackStopped), start("V2"));
    }

    #[test]
    fn stopped_before_stop_ack_waits_for_ack() {
        let mut sm = running(true);
        sm.on_event(Event::ResetPulse);
        assert_eq!(sm.on_event(Event::PlaybackStopped), None);
        assert_eq!(ack(&mut sm, PlayerCommand::Stop), start("V2"));
    }

    #[test]
    fn failed_start_goes_idle_without_retry() {
        let mut sm = machine();
        sm.on_startup();
        let failed = sm.on_event(Event::CommandFailed(
            PlayerCommand::Start,
            PlayerError::Rejected("loading failed".into()),
        ));
        assert_eq!(failed, None);
        assert_eq!(sm.state(), PlaybackState::Idle);
        assert!(sm.in_flight().is_none());

        assert_eq!(sm.on_event(Event::MotionChanged(true)), None);
        assert_eq!(sm.on_event(Event::PlaybackStopped), None);
        assert_eq!(sm.state(), PlaybackState::Idle);

        // Manual intervention re-arms playback with the next video.
        assert_eq!(sm.on_event(Event::ResetPulse), start("V2"));
    }

    #[test]
    fn failed_pause_keeps_state() {
        let mut sm = machine();
        sm.on_startup();
        ack(&mut sm, PlayerCommand::Start);
        let after = sm.on_event(Event::CommandFailed(
            PlayerCommand::Pause,
            PlayerError::Disconnected,
        ));
        assert_eq!(after, None);
        assert_eq!(sm.state(), PlaybackState::Paused);
        assert!(sm.in_flight().is_none());
    }

    #[test]
    fn motion_changes_during_pause_are_reconciled_after_ack() {
        let mut sm = running(true);
        assert_eq!(
            sm.on_event(Event::MotionChanged(false)),
            Some(Action::Pause)
        );
        assert_eq!(sm.on_event(Event::MotionChanged(true)), None);
        assert_eq!(ack(&mut sm, PlayerCommand::Pause), Some(Action::Resume));
        assert_eq!(sm.state(), PlaybackState::Playing);
    }

    #[test]
    fn reset_during_pause_ack_is_deferred() {
        let mut sm = running(true);
        sm.on_event(Event::MotionChanged(false));
        assert_eq!(sm.on_event(Event::ResetPulse), None);
        assert_eq!(ack(&mut sm, PlayerCommand::Pause), Some(Action::Stop));
        assert_eq!(sm.state(), PlaybackState::Stopping);
    }

    #[test]
    fn reset_during_start_stops_once_started() {
        let mut sm = machine();
        sm.on_event(Event::MotionChanged(true));
        sm.on_startup();
        assert_eq!(sm.on_event(Event::ResetPulse), None);
        assert_eq!(ack(&mut sm, PlayerCommand::Start), Some(Action::Stop));
        assert_eq!(sm.state(), PlaybackState::Stopping);
    }

    #[test]
    fn reset_coinciding_with_end_advances_once() {
        let mut sm = running(true);
        sm.on_event(Event::MotionChanged(false));
        sm.on_event(Event::PlaybackStopped);
        sm.on_event(Event::ResetPulse);
        assert_eq!(ack(&mut sm, PlayerCommand::Pause), start("V2"));
        ack(&mut sm, PlayerCommand::Start);
        assert_eq!(sm.state(), PlaybackState::Paused);
        assert_eq!(sm.playlist().position(), 1);
    }

    #[test]
    fn stray_acknowledgements_are_ignored() {
        let mut sm = running(true);
        assert_eq!(ack(&mut sm, PlayerCommand::Stop), None);
        assert_eq!(sm.state(), PlaybackState::Playing);
    }

    #[test]
    fn startup_only_acts_once() {
        let mut sm = machine();
        assert!(sm.on_startup().is_some());
        assert!(sm.on_startup().is_none());
    }
}
