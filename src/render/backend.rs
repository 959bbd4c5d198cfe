// Copyright 2025 the Notegraph Authors
// SPDX-License-Identifier: Apache-2.0

//! The contract between the raster pipeline and whatever draws.
//!
//! A backend owns buffers it hands out as [`ResourceHandle`]s, accepts
//! typed instance uploads into them, and executes an ordered list of
//! [`DrawPass`]es per frame. Calls are synchronous and non-cancellable.

use super::instances::{
    BodyInstance, BorderInstance, CircleInstance, GlyphInstance, MeasureInstance, RingInstance,
};
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;
use thiserror::Error;

/// One instanced draw family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BatchKind {
    Bodies,
    SilentBorders,
    Origin,
    Measures,
    Rings,
    Glyphs,
}

impl BatchKind {
    /// Paint order
    pub const ALL: [BatchKind; 6] = [
        BatchKind::Bodies,
        BatchKind::SilentBorders,
        BatchKind::Origin,
        BatchKind::Measures,
        BatchKind::Rings,
        BatchKind::Glyphs,
    ];

    /// Size in bytes of one instance record
    pub fn stride(self) -> usize {
        match self {
            BatchKind::Bodies => size_of::<BodyInstance>(),
            BatchKind::SilentBorders => size_of::<BorderInstance>(),
            BatchKind::Origin => size_of::<CircleInstance>(),
            BatchKind::Measures => size_of::<MeasureInstance>(),
            BatchKind::Rings => size_of::<RingInstance>(),
            BatchKind::Glyphs => size_of::<GlyphInstance>(),
        }
    }

    /// Only bodies establish depth; overlays test against it
    pub fn writes_depth(self) -> bool {
        matches!(self, BatchKind::Bodies)
    }
}

/// Logical name of a backend resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    Batch(BatchKind),
    /// Rasterized glyph coverage
    GlyphAtlas,
}

/// Backend-issued reference to an allocated resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
    #[error("failed to allocate {bytes} bytes for {key:?}")]
    Allocation { key: ResourceKey, bytes: usize },
    #[error("unknown resource handle {0:?}")]
    UnknownHandle(ResourceHandle),
    #[error("upload of {bytes} bytes exceeds capacity {capacity} of {handle:?}")]
    Overflow {
        handle: ResourceHandle,
        bytes: usize,
        capacity: usize,
    },
}

/// A borrowed, typed instance slice
#[derive(Debug, Clone, Copy)]
pub enum InstanceData<'a> {
    Bodies(&'a [BodyInstance]),
    Borders(&'a [BorderInstance]),
    Circles(&'a [CircleInstance]),
    Measures(&'a [MeasureInstance]),
    Rings(&'a [RingInstance]),
    Glyphs(&'a [GlyphInstance]),
}

impl<'a> InstanceData<'a> {
    pub fn len(&self) -> usize {
        match self {
            InstanceData::Bodies(d) => d.len(),
            InstanceData::Borders(d) => d.len(),
            InstanceData::Circles(d) => d.len(),
            InstanceData::Measures(d) => d.len(),
            InstanceData::Rings(d) => d.len(),
            InstanceData::Glyphs(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes, as a GPU upload would see them
    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            InstanceData::Bodies(d) => bytemuck::cast_slice(d),
            InstanceData::Borders(d) => bytemuck::cast_slice(d),
            InstanceData::Circles(d) => bytemuck::cast_slice(d),
            InstanceData::Measures(d) => bytemuck::cast_slice(d),
            InstanceData::Rings(d) => bytemuck::cast_slice(d),
            InstanceData::Glyphs(d) => bytemuck::cast_slice(d),
        }
    }

    /// The first `count` instances (all of them if fewer)
    pub fn prefix(&self, count: usize) -> InstanceData<'a> {
        match *self {
            InstanceData::Bodies(d) => InstanceData::Bodies(&d[..count.min(d.len())]),
            InstanceData::Borders(d) => InstanceData::Borders(&d[..count.min(d.len())]),
            InstanceData::Circles(d) => InstanceData::Circles(&d[..count.min(d.len())]),
            InstanceData::Measures(d) => InstanceData::Measures(&d[..count.min(d.len())]),
            InstanceData::Rings(d) => InstanceData::Rings(&d[..count.min(d.len())]),
            InstanceData::Glyphs(d) => InstanceData::Glyphs(&d[..count.min(d.len())]),
        }
    }

    pub fn to_buffer(&self) -> InstanceBuffer {
        match *self {
            InstanceData::Bodies(d) => InstanceBuffer::Bodies(d.to_vec()),
            InstanceData::Borders(d) => InstanceBuffer::Borders(d.to_vec()),
            InstanceData::Circles(d) => InstanceBuffer::Circles(d.to_vec()),
            InstanceData::Measures(d) => InstanceBuffer::Measures(d.to_vec()),
            InstanceData::Rings(d) => InstanceBuffer::Rings(d.to_vec()),
            InstanceData::Glyphs(d) => InstanceBuffer::Glyphs(d.to_vec()),
        }
    }
}

/// An owned copy of an upload, kept by backends that paint on the CPU
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceBuffer {
    Bodies(Vec<BodyInstance>),
    Borders(Vec<BorderInstance>),
    Circles(Vec<CircleInstance>),
    Measures(Vec<MeasureInstance>),
    Rings(Vec<RingInstance>),
    Glyphs(Vec<GlyphInstance>),
}

impl InstanceBuffer {
    pub fn len(&self) -> usize {
        match self {
            InstanceBuffer::Bodies(d) => d.len(),
            InstanceBuffer::Borders(d) => d.len(),
            InstanceBuffer::Circles(d) => d.len(),
            InstanceBuffer::Measures(d) => d.len(),
            InstanceBuffer::Rings(d) => d.len(),
            InstanceBuffer::Glyphs(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Values constant across one frame
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Viewport in logical pixels
    pub viewport: [f32; 2],
    /// Logical to physical pixel ratio
    pub scale_factor: f32,
    pub _pad: f32,
    pub clear_color: [f32; 4],
}

impl FrameUniforms {
    /// Map a logical screen point to normalized device coordinates
    pub fn to_ndc(&self, x: f32, y: f32) -> [f32; 2] {
        let w = self.viewport[0].max(1.0);
        let h = self.viewport[1].max(1.0);
        [2.0 * x / w - 1.0, 1.0 - 2.0 * y / h]
    }
}

/// One instanced draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawPass {
    pub kind: BatchKind,
    pub handle: ResourceHandle,
    pub instances: usize,
    pub depth_test: bool,
    pub depth_write: bool,
}

/// A rasterization backend
pub trait RasterBackend {
    /// Allocate a resource of at least `bytes`
    fn allocate(&mut self, key: ResourceKey, bytes: usize) -> Result<ResourceHandle, RasterError>;

    /// Free a resource; unknown handles are ignored
    fn release(&mut self, handle: ResourceHandle);

    /// Replace the contents of a resource
    fn upload(&mut self, handle: ResourceHandle, data: InstanceData<'_>) -> Result<(), RasterError>;

    /// Execute passes in order
    fn draw(&mut self, uniforms: &FrameUniforms, passes: &[DrawPass]) -> Result<(), RasterError>;
}

/// A call observed by [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Allocate { key: ResourceKey, bytes: usize },
    Release(ResourceHandle),
    Upload { handle: ResourceHandle, instances: usize },
    Draw { passes: Vec<DrawPass> },
}

/// Backend that records calls and keeps uploads, for tests
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<BackendCall>,
    /// Latest contents of each live resource
    pub buffers: HashMap<ResourceHandle, InstanceBuffer>,
    capacities: HashMap<ResourceHandle, usize>,
    next_handle: u32,
    /// Allocations larger than this many bytes fail
    pub max_allocation: Option<usize>,
    pub frames: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that refuses allocations above `bytes`
    pub fn with_allocation_limit(bytes: usize) -> Self {
        Self {
            max_allocation: Some(bytes),
            ..Self::default()
        }
    }

    pub fn capacity(&self, handle: ResourceHandle) -> Option<usize> {
        self.capacities.get(&handle).copied()
    }

    pub fn live_resources(&self) -> usize {
        self.capacities.len()
    }

    /// Passes of the most recent draw
    pub fn last_passes(&self) -> Option<&[DrawPass]> {
        self.calls.iter().rev().find_map(|call| match call {
            BackendCall::Draw { passes } => Some(passes.as_slice()),
            _ => None,
        })
    }

    pub fn uploads(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, BackendCall::Upload { .. }))
            .count()
    }

    /// Contents drawn by the latest pass of a kind
    pub fn drawn(&self, kind: BatchKind) -> Option<&InstanceBuffer> {
        let pass = self.last_passes()?.iter().find(|p| p.kind == kind)?;
        self.buffers.get(&pass.handle)
    }
}

impl RasterBackend for RecordingBackend {
    fn allocate(&mut self, key: ResourceKey, bytes: usize) -> Result<ResourceHandle, RasterError> {
        self.calls.push(BackendCall::Allocate { key, bytes });
        if self.max_allocation.is_some_and(|max| bytes > max) {
            return Err(RasterError::Allocation { key, bytes });
        }
        let handle = ResourceHandle(self.next_handle);
        self.next_handle += 1;
        self.capacities.insert(handle, bytes);
        Ok(handle)
    }

    fn release(&mut self, handle: ResourceHandle) {
        self.calls.push(BackendCall::Release(handle));
        self.capacities.remove(&handle);
        self.buffers.remove(&handle);
    }

    fn upload(&mut self, handle: ResourceHandle, data: InstanceData<'_>) -> Result<(), RasterError> {
        let capacity = self
            .capacities
            .get(&handle)
            .copied()
            .ok_or(RasterError::UnknownHandle(handle))?;
        let bytes = data.as_bytes().len();
        if bytes > capacity {
            return Err(RasterError::Overflow {
                handle,
                bytes,
                capacity,
            });
        }
        self.calls.push(BackendCall::Upload {
            handle,
            instances: data.len(),
        });
        self.buffers.insert(handle, data.to_buffer());
        Ok(())
    }

    fn draw(&mut self, _uniforms: &FrameUniforms, passes: &[DrawPass]) -> Result<(), RasterError> {
        for pass in passes {
            if !self.capacities.contains_key(&pass.handle) {
                return Err(RasterError::UnknownHandle(pass.handle));
            }
        }
        self.frames += 1;
        self.calls.push(BackendCall::Draw {
            passes: passes.to_vec(),
        });
        Ok(())
    }
}
