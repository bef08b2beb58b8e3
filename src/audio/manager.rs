use anyhow::{Context, Result};
use jack::{AsyncClient, Client, ClientOptions};
use log::{error, info, warn};

use crate::audio::engine::{Engine, EngineHandle};
use crate::audio::jack::{NotificationHandler, ProcessHandler};
use crate::audio::ports::{IN_LEFT, IN_RIGHT, OUT_LEFT, OUT_RIGHT};
use crate::settings::AudioSettings;

const CLIENT_NAME: &str = "switchfx";

/// Owns the running JACK client; dropping it deactivates the client.
pub struct Manager {
    active_client: AsyncClient<NotificationHandler, ProcessHandler>,
    engine_handle: EngineHandle,
}

impl Manager {
    pub fn new(settings: &AudioSettings, engine: Engine) -> Result<Self> {
        let (client, _) = Client::new(CLIENT_NAME, ClientOptions::NO_START_SERVER)
            .context("failed to create JACK client")?;

        info!(
            "JACK client up: sample rate {}, buffer size {}",
            client.sample_rate(),
            client.buffer_size()
        );

        let engine_handle = engine.handle();
        let jack_handler =
            ProcessHandler::new(&client, engine).context("failed to create process handler")?;

        let active_client = client
            .activate_async(NotificationHandler, jack_handler)
            .context("failed to activate async client")?;

        let manager = Self {
            active_client,
            engine_handle,
        };

        manager.connect_ports(settings);

        Ok(manager)
    }

    /// Connect audio ports based on settings
    fn connect_ports(&self, settings: &AudioSettings) {
        let client = self.active_client.as_client();

        let connections = [
            (settings.input_left_port.clone(), full_name(IN_LEFT)),
            (settings.input_right_port.clone(), full_name(IN_RIGHT)),
            (full_name(OUT_LEFT), settings.output_left_port.clone()),
            (full_name(OUT_RIGHT), settings.output_right_port.clone()),
        ];

        for (source, destination) in &connections {
            if let Err(e) = client.connect_ports_by_name(source, destination) {
                warn!("Failed to connect '{source}' -> '{destination}': {e}");
            } else {
                info!("Connected {source} -> {destination}");
            }
        }
    }

    /// Disconnect all audio connections
    pub fn disconnect_all(&self) {
        let client = self.active_client.as_client();

        for name in [IN_LEFT, IN_RIGHT, OUT_LEFT, OUT_RIGHT] {
            if let Some(port) = client.port_by_name(&full_name(name)) {
                client.disconnect(&port).unwrap_or_else(|e| {
                    error!("Failed to disconnect {name}: {e}");
                });
            }
        }
    }

    /// Reconnect with new settings
    pub fn apply_settings(&self, settings: &AudioSettings) {
        info!("Applying new audio settings");
        self.disconnect_all();
        self.connect_ports(settings);
    }

    pub const fn engine(&self) -> &EngineHandle {
        &self.engine_handle
    }

    pub fn sample_rate(&self) -> usize {
        self.active_client.as_client().sample_rate() as usize
    }

    pub fn buffer_size(&self) -> usize {
        self.active_client.as_client().buffer_size() as usize
    }
}

fn full_name(port: &str) -> String {
    format!("{CLIENT_NAME}:{port}")
}
