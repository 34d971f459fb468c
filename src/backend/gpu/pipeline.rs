/// Fluent wrapper around `wgpu::RenderPipelineDescriptor` for the two
/// layered pipelines (opaque and blended), which differ only in blend and
/// depth-write state.
pub(crate) struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<&'a str>,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    vertex_buffers: Vec<wgpu::VertexBufferLayout<'a>>,
    color_targets: Vec<Option<wgpu::ColorTargetState>>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    primitive: wgpu::PrimitiveState,
}

impl<'a> PipelineBuilder<'a> {
    pub(crate) fn new(
        device: &'a wgpu::Device,
        layout: &'a wgpu::PipelineLayout,
        shader: &'a wgpu::ShaderModule,
    ) -> Self {
        Self {
            device,
            label: None,
            layout,
            shader,
            vertex_buffers: Vec::new(),
            color_targets: Vec::new(),
            depth_stencil: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
        }
    }

    pub(crate) fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub(crate) fn with_vertex_buffer(mut self, layout: wgpu::VertexBufferLayout<'a>) -> Self {
        self.vertex_buffers.push(layout);
        self
    }

    pub(crate) fn with_color_target(
        mut self,
        format: wgpu::TextureFormat,
        blend: Option<wgpu::BlendState>,
    ) -> Self {
        self.color_targets.push(Some(wgpu::ColorTargetState {
            format,
            blend,
            write_mask: wgpu::ColorWrites::ALL,
        }));
        self
    }

    pub(crate) fn with_depth_stencil(
        mut self,
        format: wgpu::TextureFormat,
        depth_write: bool,
        depth_compare: wgpu::CompareFunction,
    ) -> Self {
        self.depth_stencil = Some(wgpu::DepthStencilState {
            format,
            depth_write_enabled: depth_write,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        self
    }

    /// Layout quads and translucent shells are seen from both sides.
    pub(crate) fn with_no_culling(mut self) -> Self {
        self.primitive.cull_mode = None;
        self
    }

    pub(crate) fn build(self) -> wgpu::RenderPipeline {
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: self.label,
                layout: Some(self.layout),
                vertex: wgpu::VertexState {
                    module: self.shader,
                    entry_point: Some("vs_main"),
                    buffers: &self.vertex_buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: self.shader,
                    entry_point: Some("fs_main"),
                    targets: &self.color_targets,
                    compilation_options: Default::default(),
                }),
                primitive: self.primitive,
                depth_stencil: self.depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
    }
}
