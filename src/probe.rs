use std::sync::Arc;

use glam::{Affine3A, Vec3};
use serde::Serialize;

use crate::config::{ProbeConfig, PulseConfig};
use crate::field::DensityField;

/// 交给外部振动执行器的一次脉冲
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HapticPulse {
    pub duration: f32,
    pub frequency: f32,
    pub amplitude: f32,
}

/// 触觉强度探针
/// 把世界坐标（手柄位置）变换到场的局部空间再采样
#[derive(Debug, Clone)]
pub struct IntensityProbe {
    world_to_local: Affine3A,
    pulse: PulseConfig,
}

impl IntensityProbe {
    /// `local_to_world` 为立方体的摆放变换
    pub fn new(local_to_world: Affine3A, pulse: PulseConfig) -> Self {
        Self {
            world_to_local: local_to_world.inverse(),
            pulse,
        }
    }

    pub fn from_config(probe: &ProbeConfig, pulse: &PulseConfig) -> Self {
        Self::new(probe.local_to_world(), pulse.clone())
    }

    pub fn to_local(&self, world: Vec3) -> Vec3 {
        self.world_to_local.transform_point3(world)
    }

    /// 查询强度；没有场或位置在立方体外时返回 0
    pub fn query_intensity(&self, field: Option<&DensityField>, world: Vec3) -> f32 {
        match field {
            Some(field) => field.sample_at(self.to_local(world)).max(0.0),
            None => 0.0,
        }
    }

    pub fn pulse_at(&self, field: Option<&Arc<DensityField>>, world: Vec3) -> HapticPulse {
        HapticPulse {
            duration: self.pulse.duration,
            frequency: self.pulse.frequency,
            amplitude: self.query_intensity(field.map(|f| f.as_ref()), world),
        }
    }
}
